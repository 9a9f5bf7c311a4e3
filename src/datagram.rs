//! Request and response datagram framing.
//!
//! Every transaction is a single 32-bit exchange, most significant byte
//! first. The host sends a request datagram and simultaneously receives the
//! response to it:
//!
//! ```text
//! request   31   30:29  28:25  24   23:0
//!           RRS  SMDA   IDX    RW   DATA
//!
//! response  31:24   23:0
//!           STATUS  DATA
//! ```
//!
//! Bits 31:25 of a request together form the 7-bit register address.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::{Access, RegisterSpace};
use crate::registers::Status;

/// Mask of the 24-bit payload carried by both datagram directions.
pub const DATA_MASK: u32 = 0x00FF_FFFF;
/// Mask of the 2-bit `SMDA` field.
pub const SMDA_MASK: u8 = 0b11;
/// Mask of the 4-bit register index field.
pub const ADDRESS_MASK: u8 = 0b1111;

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MosiDatagram {
    // Payload (bits 23:0).
    data: B24,
    // Read/write selector (bit 24).
    rw: Access,
    // Register index (bits 28:25).
    address: B4,
    // Motor or common register set (bits 30:29).
    smda: B2,
    // Register or RAM space (bit 31).
    rrs: RegisterSpace,
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MisoDatagram {
    // Payload (bits 23:0).
    data: B24,
    // Chip status (bits 31:24).
    status: B8,
}

/// Decoded request datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    /// Register or RAM space.
    pub space: RegisterSpace,
    /// Motor index, or [`SMDA_COMMON`](crate::registers::SMDA_COMMON).
    pub smda: u8,
    /// Register index within the selected set.
    pub address: u8,
    /// Transfer direction.
    pub access: Access,
    /// Payload; ignored by the chip for reads.
    pub data: u32,
}

impl Request {
    /// Builds a register read request.
    pub const fn read(smda: u8, address: u8) -> Self {
        Self {
            space: RegisterSpace::Register,
            smda,
            address,
            access: Access::Read,
            data: 0,
        }
    }

    /// Builds a register write request.
    pub const fn write(smda: u8, address: u8, data: u32) -> Self {
        Self {
            space: RegisterSpace::Register,
            smda,
            address,
            access: Access::Write,
            data,
        }
    }

    /// Packs the request into a 32-bit frame. Fields wider than their slot
    /// are masked.
    pub fn encode(&self) -> u32 {
        let datagram = MosiDatagram::new()
            .with_data(self.data & DATA_MASK)
            .with_rw(self.access)
            .with_address(self.address & ADDRESS_MASK)
            .with_smda(self.smda & SMDA_MASK)
            .with_rrs(self.space);
        u32::from_le_bytes(datagram.into_bytes())
    }

    /// Unpacks a 32-bit request frame.
    pub fn decode(frame: u32) -> Self {
        let datagram = MosiDatagram::from_bytes(frame.to_le_bytes());
        Self {
            space: datagram.rrs(),
            smda: datagram.smda(),
            address: datagram.address(),
            access: datagram.rw(),
            data: datagram.data(),
        }
    }
}

/// Decoded response datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
    /// Chip status, lagging one transaction behind.
    pub status: Status,
    /// Register payload for reads.
    pub data: u32,
}

impl Response {
    /// Unpacks a 32-bit response frame.
    pub fn decode(frame: u32) -> Self {
        let datagram = MisoDatagram::from_bytes(frame.to_le_bytes());
        Self {
            status: Status::from(datagram.status()),
            data: datagram.data(),
        }
    }

    /// Packs the response into a 32-bit frame, as the chip would send it.
    pub fn encode(&self) -> u32 {
        let datagram = MisoDatagram::new()
            .with_data(self.data & DATA_MASK)
            .with_status(u8::from(self.status));
        u32::from_le_bytes(datagram.into_bytes())
    }
}

/// Packs the individual request fields into a 32-bit frame.
pub fn encode(space: RegisterSpace, smda: u8, address: u8, access: Access, data: u32) -> u32 {
    Request {
        space,
        smda,
        address,
        access,
        data,
    }
    .encode()
}

/// Splits a 32-bit response frame into status byte and payload.
pub fn decode(frame: u32) -> Response {
    Response::decode(frame)
}

//! Strongly typed parameter enumerations for the TMC429 driver.
//!
//! These enums map directly to datasheet field encodings and are used by the
//! register layouts in [`registers`](crate::registers) and the high-level
//! driver APIs.
//!
//! # Examples
//!
//! ```rust
//! use tmc429::params::{Mode, OutputMode, ReferencePolarity};
//!
//! let mode = Mode::Velocity;
//! let output = OutputMode::StepDir;
//! let polarity = ReferencePolarity::ActiveLow;
//! let _ = (mode, output, polarity);
//! ```

use modular_bitfield::prelude::Specifier;

/// Number of motor channels driven by one chip.
pub const MOTOR_COUNT: usize = 3;

/// Register space selector (`RRS`, datagram bit 31).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum RegisterSpace {
    /// Register set.
    Register = 0,
    /// On-chip RAM holding the driver chain configuration table.
    Ram = 1,
}

/// Transfer direction (`RW`, datagram bit 24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum Access {
    /// Write the payload into the addressed register.
    Write = 0,
    /// Read the addressed register; payload is ignored.
    Read = 1,
}

/// Motion modes encoded in `REF_CONF_MODE[1:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 2]
pub enum Mode {
    /// Position mode with trapezoidal ramp towards `X_TARGET`.
    Ramp = 0b00,
    /// Velocity mode with soft, exponential approach to `V_TARGET`.
    Soft = 0b01,
    /// Velocity mode with linear ramp to `V_TARGET`.
    Velocity = 0b10,
    /// `V_TARGET` is applied immediately without ramping.
    Hold = 0b11,
}

/// Reference switch used for the reference position (`REF_CONF_MODE.REF_RNL`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum ReferenceSwitch {
    /// Left switch.
    Left = 0,
    /// Right switch.
    Right = 1,
}

/// Polarity of the reference switch inputs (`IF_CONFIGURATION.INV_REF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum ReferencePolarity {
    /// Switches are active high.
    ActiveHigh = 0,
    /// Switches are active low.
    ActiveLow = 1,
}

/// Motor driver output selection (`IF_CONFIGURATION.EN_SD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 1]
pub enum OutputMode {
    /// SPI driver chain output.
    Spi = 0,
    /// Step/direction output.
    StepDir = 1,
}

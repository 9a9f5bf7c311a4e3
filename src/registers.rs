//! Register map definitions for the TMC429 motion controller.
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::params::{Mode, OutputMode, ReferencePolarity, ReferenceSwitch};

/// `SMDA` value selecting the common (non-motor) register set.
pub const SMDA_COMMON: u8 = 0b11;

/// Chip identity reported by `TYPE_VERSION`.
pub const EXPECTED_VERSION: u32 = 0x0042_9101;

// Per-motor registers (SMDA 0..=2).

/// Register index of `X_TARGET`.
pub const REG_X_TARGET: u8 = 0x0;
/// Register index of `X_ACTUAL`.
pub const REG_X_ACTUAL: u8 = 0x1;
/// Register index of `V_MIN`.
pub const REG_V_MIN: u8 = 0x2;
/// Register index of `V_MAX`.
pub const REG_V_MAX: u8 = 0x3;
/// Register index of `V_TARGET`.
pub const REG_V_TARGET: u8 = 0x4;
/// Register index of `V_ACTUAL`.
pub const REG_V_ACTUAL: u8 = 0x5;
/// Register index of `A_MAX`.
pub const REG_A_MAX: u8 = 0x6;
/// Register index of `A_ACTUAL`.
pub const REG_A_ACTUAL: u8 = 0x7;
/// Register index of `A_THRESHOLD`.
pub const REG_A_THRESHOLD: u8 = 0x8;
/// Register index of `PMUL_PDIV`.
pub const REG_PMUL_PDIV: u8 = 0x9;
/// Register index of `REF_CONF_MODE`.
pub const REG_REF_CONF_MODE: u8 = 0xA;
/// Register index of `INTERRUPT`.
pub const REG_INTERRUPT: u8 = 0xB;
/// Register index of the clock configuration register (`PULSE_DIV`/`RAMP_DIV`).
pub const REG_CLOCK_CONFIGURATION: u8 = 0xC;
/// Register index of `DX_REF_TOLERANCE`.
pub const REG_DX_REF_TOLERANCE: u8 = 0xD;
/// Register index of `X_LATCHED`.
pub const REG_X_LATCHED: u8 = 0xE;
/// Register index of `USTEP_COUNT`.
pub const REG_USTEP_COUNT: u8 = 0xF;

// Common registers (SMDA 3).

/// Register index of `DATAGRAM_LOW_WORD`.
pub const REG_DATAGRAM_LOW_WORD: u8 = 0x0;
/// Register index of `DATAGRAM_HIGH_WORD`.
pub const REG_DATAGRAM_HIGH_WORD: u8 = 0x1;
/// Register index of `COVER_POS_LEN`.
pub const REG_COVER_POS_LEN: u8 = 0x2;
/// Register index of `COVER_DATAGRAM`.
pub const REG_COVER_DATAGRAM: u8 = 0x3;
/// Register index of `IF_CONFIGURATION`.
pub const REG_IF_CONFIGURATION: u8 = 0x4;
/// Register index of `POS_COMP`.
pub const REG_POS_COMP: u8 = 0x5;
/// Register index of `POS_COMP_INT`.
pub const REG_POS_COMP_INT: u8 = 0x6;
/// Register index of `POWER_DOWN`.
pub const REG_POWER_DOWN: u8 = 0x8;
/// Register index of `TYPE_VERSION`.
pub const REG_TYPE_VERSION: u8 = 0x9;
/// Register index of the reference switch state register.
pub const REG_SWITCHES: u8 = 0xE;
/// Register index of `GLOBAL_PARAMETERS`.
pub const REG_GLOBAL_PARAMETERS: u8 = 0xF;

/// Access permissions encoded for each register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterAccess {
    /// Read-only register.
    ReadOnly,
    /// Write-only register.
    WriteOnly,
    /// Read/write register.
    ReadWrite,
}

/// Register bank a layout lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterBank {
    /// One copy per motor, addressed by motor index.
    Motor,
    /// Single copy addressed with [`SMDA_COMMON`].
    Common,
}

/// Minimal metadata exposed by every structured register layout.
pub trait Register: From<u32> + Into<u32> + Copy {
    /// Register index as documented in the datasheet.
    const ADDRESS: u8;
    /// Bank holding the register.
    const BANK: RegisterBank;
    /// Access permission classification.
    const ACCESS: RegisterAccess;
}

/// Status byte returned in the top eight bits of every response datagram.
///
/// The flags describe the chip state sampled during the previous datagram.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    // Motor 0 reached X_TARGET (bit 0).
    pub at_target_position_0: bool,
    // Motor 0 left reference switch active (bit 1).
    pub switch_left_0: bool,
    // Motor 1 reached X_TARGET (bit 2).
    pub at_target_position_1: bool,
    // Motor 1 left reference switch active (bit 3).
    pub switch_left_1: bool,
    // Motor 2 reached X_TARGET (bit 4).
    pub at_target_position_2: bool,
    // Motor 2 left reference switch active (bit 5).
    pub switch_left_2: bool,
    // Cover datagram waiting to be sent (bit 6).
    pub cover_datagram_waiting: bool,
    // Interrupt line asserted (bit 7).
    pub interrupt: bool,
}

impl Status {
    /// Returns `true` when `motor` reached its target position.
    pub fn at_target_position(&self, motor: usize) -> bool {
        match motor {
            0 => self.at_target_position_0(),
            1 => self.at_target_position_1(),
            2 => self.at_target_position_2(),
            _ => false,
        }
    }

    /// Returns `true` when the left reference switch of `motor` is active.
    pub fn switch_left(&self, motor: usize) -> bool {
        match motor {
            0 => self.switch_left_0(),
            1 => self.switch_left_1(),
            2 => self.switch_left_2(),
            _ => false,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Self::from_bytes([value])
    }
}

impl From<Status> for u8 {
    fn from(value: Status) -> Self {
        value.into_bytes()[0]
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Status {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Status({=u8:#x})", u8::from(*self));
    }
}

// Every structured register carries a 24-bit payload; the datagram's top
// byte never reaches the layout.
macro_rules! payload_conversions {
    ($layout:ty) => {
        impl From<u32> for $layout {
            fn from(value: u32) -> Self {
                let [b0, b1, b2, _] = value.to_le_bytes();
                Self::from_bytes([b0, b1, b2])
            }
        }

        impl From<$layout> for u32 {
            fn from(value: $layout) -> Self {
                let [b0, b1, b2] = value.into_bytes();
                u32::from_le_bytes([b0, b1, b2, 0])
            }
        }
    };
}

/// Bitfield representation of `REF_CONF_MODE` (per motor, index `0xA`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefConfMode {
    // Motion mode (bits 1:0).
    pub mode: Mode,
    #[skip]
    __: B6,
    // Left switch does not stop the motor (bit 8).
    pub disable_stop_l: bool,
    // Right switch does not stop the motor (bit 9).
    pub disable_stop_r: bool,
    // Switch events ramp down instead of stopping hard (bit 10).
    pub soft_stop: bool,
    // Switch used as reference (bit 11).
    pub ref_rnl: ReferenceSwitch,
    #[skip]
    __: B4,
    // Position latched on reference switch event (bit 16, read-only).
    pub lp: bool,
    #[skip]
    __: B7,
}

payload_conversions!(RefConfMode);

/// Bitfield representation of `IF_CONFIGURATION` (common, index `0x4`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfConf {
    // Reference switch polarity (bit 0).
    pub inv_ref: ReferencePolarity,
    // Interrupt routed to SDO_C while chip select is idle (bit 1).
    pub sdo_int: bool,
    // Step pulses toggle instead of pulsing (bit 2).
    pub step_half: bool,
    // Inverted step output (bit 3).
    pub inv_stp: bool,
    // Inverted direction output (bit 4).
    pub inv_dir: bool,
    // Step/direction or SPI driver chain output (bit 5).
    pub en_sd: OutputMode,
    // Motor whose position drives the compare output (bits 7:6).
    pub pos_comp_sel: B2,
    // Right reference switch inputs enabled (bit 8).
    pub en_refr: bool,
    #[skip]
    __: B15,
}

payload_conversions!(IfConf);

/// Bitfield representation of the reference switch state (common, index `0xE`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchState {
    // Motor 0 right switch (bit 0).
    pub r0: bool,
    // Motor 0 left switch (bit 1).
    pub l0: bool,
    // Motor 1 right switch (bit 2).
    pub r1: bool,
    // Motor 1 left switch (bit 3).
    pub l1: bool,
    // Motor 2 right switch (bit 4).
    pub r2: bool,
    // Motor 2 left switch (bit 5).
    pub l2: bool,
    #[skip]
    __: B18,
}

payload_conversions!(SwitchState);

impl SwitchState {
    /// Returns the left switch input of `motor`, `false` for unknown motors.
    pub fn left(&self, motor: usize) -> bool {
        match motor {
            0 => self.l0(),
            1 => self.l1(),
            2 => self.l2(),
            _ => false,
        }
    }

    /// Returns the right switch input of `motor`, `false` for unknown motors.
    pub fn right(&self, motor: usize) -> bool {
        match motor {
            0 => self.r0(),
            1 => self.r1(),
            2 => self.r2(),
            _ => false,
        }
    }
}

/// Bitfield representation of the clock configuration register (per motor, index `0xC`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClkConfig {
    // Microstep resolution selection (bits 2:0).
    pub usrs: B3,
    #[skip]
    __: B5,
    // Acceleration clock divider exponent (bits 11:8).
    pub ramp_div: B4,
    // Velocity clock divider exponent (bits 15:12).
    pub pulse_div: B4,
    #[skip]
    __: B8,
}

payload_conversions!(ClkConfig);

/// Bitfield representation of `GLOBAL_PARAMETERS` (common, index `0xF`).
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalParameters {
    // Last motor in the SPI driver chain (bits 1:0).
    pub lsmd: B2,
    pub nscs_s: bool,
    pub sck_s: bool,
    pub ph_ab: bool,
    pub fd_ab: bool,
    pub dac_ab: bool,
    pub cs_comind: bool,
    // Step pulse length divider (bits 15:8).
    pub clk2_div: B8,
    // Continuous driver chain update (bit 16).
    pub cont_update: bool,
    #[skip]
    __: B2,
    pub ref_mux: bool,
    pub mot1r: bool,
    #[skip]
    __: B3,
}

payload_conversions!(GlobalParameters);

impl Register for RefConfMode {
    const ADDRESS: u8 = REG_REF_CONF_MODE;
    const BANK: RegisterBank = RegisterBank::Motor;
    const ACCESS: RegisterAccess = RegisterAccess::ReadWrite;
}

impl Register for IfConf {
    const ADDRESS: u8 = REG_IF_CONFIGURATION;
    const BANK: RegisterBank = RegisterBank::Common;
    const ACCESS: RegisterAccess = RegisterAccess::ReadWrite;
}

impl Register for SwitchState {
    const ADDRESS: u8 = REG_SWITCHES;
    const BANK: RegisterBank = RegisterBank::Common;
    const ACCESS: RegisterAccess = RegisterAccess::ReadOnly;
}

impl Register for ClkConfig {
    const ADDRESS: u8 = REG_CLOCK_CONFIGURATION;
    const BANK: RegisterBank = RegisterBank::Motor;
    const ACCESS: RegisterAccess = RegisterAccess::ReadWrite;
}

impl Register for GlobalParameters {
    const ADDRESS: u8 = REG_GLOBAL_PARAMETERS;
    const BANK: RegisterBank = RegisterBank::Common;
    const ACCESS: RegisterAccess = RegisterAccess::ReadWrite;
}

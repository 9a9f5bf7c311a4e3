//! High-level TMC429 device driver implementation.

use crate::config::{cap_clock_frequency, Config};
use crate::conversion::{
    self,
    PULSE_DIV_MAX,
    POSITION_FIELD_WIDTH,
    VELOCITY_FIELD_WIDTH,
    VELOCITY_REGISTER_MAX,
};
use crate::datagram::{Request, Response};
use crate::error::{Error, Result};
use crate::interface::spi::SpiInterface;
use crate::interface::Tmc429Interface;
use crate::params::{Mode, OutputMode, ReferencePolarity, ReferenceSwitch, MOTOR_COUNT};
use crate::registers::{
    ClkConfig,
    GlobalParameters,
    IfConf,
    RefConfMode,
    Register,
    RegisterAccess,
    RegisterBank,
    Status,
    SwitchState,
    EXPECTED_VERSION,
    REG_TYPE_VERSION,
    REG_V_ACTUAL,
    REG_V_MAX,
    REG_V_MIN,
    REG_V_TARGET,
    REG_X_ACTUAL,
    REG_X_TARGET,
    SMDA_COMMON,
};
use embedded_hal::spi::SpiDevice;

const VELOCITY_TARGET_MIN: i32 = -(1 << (VELOCITY_FIELD_WIDTH - 1));
const VELOCITY_TARGET_MAX: i32 = (1 << (VELOCITY_FIELD_WIDTH - 1)) - 1;
const POSITION_MIN: i32 = -(1 << (POSITION_FIELD_WIDTH - 1));
const POSITION_MAX: i32 = (1 << (POSITION_FIELD_WIDTH - 1)) - 1;

/// High-level synchronous driver for the TMC429 motion controller.
///
/// The handle caches the chip status reported by the last datagram and the
/// `pulse_div` exponent of every motor. Every accessor takes `&mut self`, so
/// sharing a chip between execution contexts means locking the whole handle
/// for the duration of each call, not just the bus.
///
/// Motor indices outside `0..3` are not errors: getters return a zero or
/// default value and setters do nothing, without touching the bus.
pub struct Tmc429<IFACE> {
    interface: IFACE,
    config: Config,
    status: Status,
    pulse_div: [u8; MOTOR_COUNT],
}

impl<IFACE> Tmc429<IFACE> {
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a new driver instance from the provided bus interface.
    ///
    /// All `pulse_div` caches start at `0`; call [`init`](Self::init) to load
    /// them from a chip that was configured earlier.
    pub fn new(interface: IFACE, config: Config) -> Self {
        let config = Config {
            clock_frequency_mhz: cap_clock_frequency(config.clock_frequency_mhz),
        };
        Self {
            interface,
            config,
            status: Status::new(),
            pulse_div: [0; MOTOR_COUNT],
        }
    }

    /// Consumes the driver and returns the owned interface.
    pub fn release(self) -> (IFACE, Config) {
        (self.interface, self.config)
    }

    /// Provides mutable access to the underlying interface.
    pub fn interface_mut(&mut self) -> &mut IFACE {
        &mut self.interface
    }

    // ==================================================================
    // == Cached State ==================================================
    // ==================================================================
    /// Returns a shared reference to the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clock frequency used for unit conversion, in MHz.
    pub fn clock_frequency_mhz(&self) -> u8 {
        self.config.clock_frequency_mhz
    }

    /// Updates the clock frequency used for unit conversion, capped at 32 MHz.
    ///
    /// Velocities already programmed keep their register codes, so their
    /// value in Hz changes with the new clock.
    pub fn specify_clock_frequency_mhz(&mut self, clock_frequency_mhz: u8) {
        self.config.clock_frequency_mhz = cap_clock_frequency(clock_frequency_mhz);
    }

    /// Status reported by the most recent datagram.
    ///
    /// The chip reports status with one datagram of latency, so this reflects
    /// the state sampled during the transaction before the last one.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Cached `pulse_div` exponent of `motor`, `0` for unknown motors.
    pub fn pulse_div(&self, motor: usize) -> u8 {
        self.pulse_div.get(motor).copied().unwrap_or(0)
    }

    /// Highest step frequency the chip can produce with the current clock.
    pub fn velocity_max_max_hz(&self) -> u32 {
        conversion::velocity_max_max_hz(self.config.clock_frequency_mhz)
    }

    fn motor_in_range(motor: usize) -> bool {
        let valid = motor < MOTOR_COUNT;
        if !valid {
            warn!("motor index {=usize} out of range", motor);
        }
        valid
    }

    fn code_to_hz(&self, motor: usize, code: i32) -> i32 {
        conversion::velocity_to_hz(self.config.clock_frequency_mhz, self.pulse_div[motor], code)
    }

    fn hz_to_code(&self, motor: usize, hz: i32) -> i32 {
        conversion::hz_to_velocity(self.config.clock_frequency_mhz, self.pulse_div[motor], hz)
    }
}

impl<SPI> Tmc429<SpiInterface<SPI>>
where
    SPI: SpiDevice,
{
    // ==================================================================
    // == SPI Convenience Constructors ==================================
    // ==================================================================
    /// Convenience constructor for SPI transports.
    pub fn new_spi(spi: SPI, config: Config) -> Self {
        Self::new(SpiInterface::new(spi), config)
    }

    /// Releases the driver, returning the SPI device and configuration.
    pub fn release_spi(self) -> (SPI, Config) {
        let (iface, config) = self.release();
        (iface.release(), config)
    }
}

impl<IFACE, CommE> Tmc429<IFACE>
where
    IFACE: Tmc429Interface<Error = CommE>,
{
    // ==================================================================
    // == Initialization ================================================
    // ==================================================================
    /// Validates the configuration and loads every `pulse_div` cache from
    /// the chip.
    pub fn init(&mut self) -> Result<(), CommE> {
        self.config.validate().map_err(|_| Error::InvalidConfig)?;

        for motor in 0..MOTOR_COUNT {
            self.refresh_pulse_div(motor)?;
        }
        Ok(())
    }

    /// Re-reads the `pulse_div` exponent of `motor` from the chip into the
    /// cache, e.g. after the chip was reset behind the driver's back.
    pub fn refresh_pulse_div(&mut self, motor: usize) -> Result<u8, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }

        let clk_config: ClkConfig = self.read_motor(motor)?;
        let pulse_div = clk_config.pulse_div().min(PULSE_DIV_MAX);
        self.pulse_div[motor] = pulse_div;
        Ok(pulse_div)
    }

    // ==================================================================
    // == Register Access ===============================================
    // ==================================================================
    /// Reads the 24-bit payload of a register.
    ///
    /// `smda` selects motor `0..=2` or [`SMDA_COMMON`].
    pub fn read_register(&mut self, smda: u8, address: u8) -> Result<u32, CommE> {
        let response = self.exchange(Request::read(smda, address))?;
        Ok(response.data)
    }

    /// Writes the 24-bit payload of a register.
    pub fn write_register(&mut self, smda: u8, address: u8, data: u32) -> Result<(), CommE> {
        self.exchange(Request::write(smda, address, data))?;
        Ok(())
    }

    fn exchange(&mut self, request: Request) -> Result<Response, CommE> {
        let outgoing = request.encode();
        let mut frame = outgoing.to_be_bytes();
        self.interface.transfer(&mut frame)?;

        let incoming = u32::from_be_bytes(frame);
        trace!("datagram {=u32:#x} -> {=u32:#x}", outgoing, incoming);

        let response = Response::decode(incoming);
        self.status = response.status;
        Ok(response)
    }

    fn read_motor<R: Register>(&mut self, motor: usize) -> Result<R, CommE> {
        debug_assert!(R::BANK == RegisterBank::Motor);
        let raw = self.read_register(motor as u8, R::ADDRESS)?;
        Ok(R::from(raw))
    }

    fn read_common<R: Register>(&mut self) -> Result<R, CommE> {
        debug_assert!(R::BANK == RegisterBank::Common);
        let raw = self.read_register(SMDA_COMMON, R::ADDRESS)?;
        Ok(R::from(raw))
    }

    fn update_motor<R, F>(&mut self, motor: usize, mutate: F) -> Result<R, CommE>
    where
        R: Register,
        F: FnMut(&mut R),
    {
        debug_assert!(R::BANK == RegisterBank::Motor);
        self.update_register(motor as u8, mutate)
    }

    fn update_common<R, F>(&mut self, mutate: F) -> Result<R, CommE>
    where
        R: Register,
        F: FnMut(&mut R),
    {
        debug_assert!(R::BANK == RegisterBank::Common);
        self.update_register(SMDA_COMMON, mutate)
    }

    fn update_register<R, F>(&mut self, smda: u8, mut mutate: F) -> Result<R, CommE>
    where
        R: Register,
        F: FnMut(&mut R),
    {
        debug_assert!(R::ACCESS == RegisterAccess::ReadWrite);
        let current = self.read_register(smda, R::ADDRESS)?;

        let mut register = R::from(current);
        mutate(&mut register);

        let updated: u32 = register.into();
        if updated != current {
            self.write_register(smda, R::ADDRESS, updated)?;
        }

        Ok(register)
    }

    // ==================================================================
    // == Identification & Status =======================================
    // ==================================================================
    /// Reads the `TYPE_VERSION` register.
    pub fn version(&mut self) -> Result<u32, CommE> {
        self.read_register(SMDA_COMMON, REG_TYPE_VERSION)
    }

    /// Returns `true` when the chip reports the expected TMC429 version.
    pub fn check_version(&mut self) -> Result<bool, CommE> {
        Ok(self.version()? == EXPECTED_VERSION)
    }

    /// Reads the raw reference switch inputs of all motors.
    pub fn switch_state(&mut self) -> Result<SwitchState, CommE> {
        self.read_common()
    }

    // ==================================================================
    // == Clock Configuration ===========================================
    // ==================================================================
    /// Reads the clock configuration register of `motor`.
    pub fn clock_configuration(&mut self, motor: usize) -> Result<ClkConfig, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(ClkConfig::new());
        }
        self.read_motor(motor)
    }

    /// Selects and programs the finest `pulse_div` able to reach
    /// `velocity_max` Hz, returning the chosen exponent.
    pub fn set_optimal_pulse_div(&mut self, motor: usize, velocity_max: u32) -> Result<u8, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }

        let pulse_div = conversion::optimal_pulse_div(self.config.clock_frequency_mhz, velocity_max);
        self.update_motor(motor, |clk_config: &mut ClkConfig| clk_config.set_pulse_div(pulse_div))?;
        self.pulse_div[motor] = pulse_div;
        debug!("motor {=usize} pulse_div {=u8}", motor, pulse_div);
        Ok(pulse_div)
    }

    /// Step pulse length in microseconds, derived from `GLOBAL_PARAMETERS`.
    pub fn step_time_us(&mut self) -> Result<f64, CommE> {
        let global: GlobalParameters = self.read_common()?;
        let clk2_div = global.clk2_div();
        trace!("clk2_div {=u8}", clk2_div);
        Ok(conversion::step_time_us(self.config.clock_frequency_mhz, clk2_div))
    }

    // ==================================================================
    // == Motion Mode ===================================================
    // ==================================================================
    /// Reads the motion mode of `motor`.
    pub fn mode(&mut self, motor: usize) -> Result<Mode, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(Mode::Ramp);
        }
        let reg: RefConfMode = self.read_motor(motor)?;
        Ok(reg.mode())
    }

    /// Sets the motion mode of `motor`.
    pub fn set_mode(&mut self, motor: usize, mode: Mode) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        self.update_motor(motor, |reg: &mut RefConfMode| reg.set_mode(mode))?;
        Ok(())
    }

    // ==================================================================
    // == Velocity (Hz) =================================================
    // ==================================================================
    /// Programs the velocity limits of `motor` in Hz.
    ///
    /// The optimal `pulse_div` for `velocity_max` is committed first because
    /// both limits are encoded relative to it.
    pub fn set_velocity_min_max_hz(
        &mut self,
        motor: usize,
        velocity_min: u32,
        velocity_max: u32,
    ) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }

        self.set_optimal_pulse_div(motor, velocity_max)?;

        let min = self.hz_to_code(motor, saturating_hz(velocity_min));
        self.set_velocity_min(motor, unsigned_velocity_code(min))?;

        let max = self.hz_to_code(motor, saturating_hz(velocity_max));
        self.set_velocity_max(motor, unsigned_velocity_code(max))?;
        Ok(())
    }

    /// Reads `V_MIN` of `motor` in Hz.
    pub fn velocity_min_hz(&mut self, motor: usize) -> Result<u32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let code = self.velocity_min(motor)?;
        Ok(u32::try_from(self.code_to_hz(motor, i32::from(code))).unwrap_or(0))
    }

    /// Reads `V_MAX` of `motor` in Hz.
    pub fn velocity_max_hz(&mut self, motor: usize) -> Result<u32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let code = self.velocity_max(motor)?;
        Ok(u32::try_from(self.code_to_hz(motor, i32::from(code))).unwrap_or(0))
    }

    /// Reads `V_TARGET` of `motor` in Hz; negative values run backwards.
    pub fn velocity_target_hz(&mut self, motor: usize) -> Result<i32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let code = self.velocity_target(motor)?;
        Ok(self.code_to_hz(motor, i32::from(code)))
    }

    /// Writes `V_TARGET` of `motor` in Hz, clamped to the register range.
    pub fn set_velocity_target_hz(&mut self, motor: usize, velocity: i32) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let code = self
            .hz_to_code(motor, velocity)
            .clamp(VELOCITY_TARGET_MIN, VELOCITY_TARGET_MAX);
        self.set_velocity_target(motor, code as i16)
    }

    /// Reads `V_ACTUAL` of `motor` in Hz.
    pub fn velocity_actual_hz(&mut self, motor: usize) -> Result<i32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let code = self.velocity_actual(motor)?;
        Ok(self.code_to_hz(motor, i32::from(code)))
    }

    // ==================================================================
    // == Velocity (register codes) =====================================
    // ==================================================================
    /// Reads the raw `V_MIN` code of `motor`.
    pub fn velocity_min(&mut self, motor: usize) -> Result<u16, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_V_MIN)?;
        Ok((raw & VELOCITY_REGISTER_MAX) as u16)
    }

    /// Writes the raw `V_MIN` code of `motor`, clamped to 2047.
    pub fn set_velocity_min(&mut self, motor: usize, velocity: u16) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let velocity = u32::from(velocity).min(VELOCITY_REGISTER_MAX);
        self.write_register(motor as u8, REG_V_MIN, velocity)
    }

    /// Reads the raw `V_MAX` code of `motor`.
    pub fn velocity_max(&mut self, motor: usize) -> Result<u16, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_V_MAX)?;
        Ok((raw & VELOCITY_REGISTER_MAX) as u16)
    }

    /// Writes the raw `V_MAX` code of `motor`, clamped to 2047.
    pub fn set_velocity_max(&mut self, motor: usize, velocity: u16) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let velocity = u32::from(velocity).min(VELOCITY_REGISTER_MAX);
        self.write_register(motor as u8, REG_V_MAX, velocity)
    }

    /// Reads the signed `V_TARGET` code of `motor`.
    pub fn velocity_target(&mut self, motor: usize) -> Result<i16, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_V_TARGET)?;
        Ok(conversion::sign_extend(raw, VELOCITY_FIELD_WIDTH) as i16)
    }

    /// Writes the signed `V_TARGET` code of `motor`, clamped to `-2048..=2047`.
    pub fn set_velocity_target(&mut self, motor: usize, velocity: i16) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let velocity = i32::from(velocity).clamp(VELOCITY_TARGET_MIN, VELOCITY_TARGET_MAX);
        let raw = conversion::sign_compress(velocity, VELOCITY_FIELD_WIDTH);
        self.write_register(motor as u8, REG_V_TARGET, raw)
    }

    /// Reads the signed `V_ACTUAL` code of `motor`.
    pub fn velocity_actual(&mut self, motor: usize) -> Result<i16, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_V_ACTUAL)?;
        Ok(conversion::sign_extend(raw, VELOCITY_FIELD_WIDTH) as i16)
    }

    // ==================================================================
    // == Position ======================================================
    // ==================================================================
    /// Reads `X_TARGET` of `motor` in microsteps.
    pub fn position_target(&mut self, motor: usize) -> Result<i32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_X_TARGET)?;
        Ok(conversion::sign_extend(raw, POSITION_FIELD_WIDTH))
    }

    /// Writes `X_TARGET` of `motor` in microsteps.
    pub fn set_position_target(&mut self, motor: usize, position: i32) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let raw = conversion::sign_compress(position.clamp(POSITION_MIN, POSITION_MAX), POSITION_FIELD_WIDTH);
        self.write_register(motor as u8, REG_X_TARGET, raw)
    }

    /// Reads `X_ACTUAL` of `motor` in microsteps.
    pub fn position_actual(&mut self, motor: usize) -> Result<i32, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(0);
        }
        let raw = self.read_register(motor as u8, REG_X_ACTUAL)?;
        Ok(conversion::sign_extend(raw, POSITION_FIELD_WIDTH))
    }

    /// Overwrites `X_ACTUAL` of `motor`, e.g. to define the home position.
    pub fn set_position_actual(&mut self, motor: usize, position: i32) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        let raw = conversion::sign_compress(position.clamp(POSITION_MIN, POSITION_MAX), POSITION_FIELD_WIDTH);
        self.write_register(motor as u8, REG_X_ACTUAL, raw)
    }

    // ==================================================================
    // == Reference Switches ============================================
    // ==================================================================
    /// Reads the reference configuration and mode register of `motor`.
    pub fn reference_configuration(&mut self, motor: usize) -> Result<RefConfMode, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(RefConfMode::new());
        }
        self.read_motor(motor)
    }

    /// Lets the left reference switch stop `motor`.
    pub fn enable_left_switch_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_disable_stop_l(false))
    }

    /// Keeps `motor` running when the left reference switch triggers.
    pub fn disable_left_switch_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_disable_stop_l(true))
    }

    /// Lets the right reference switch stop `motor`.
    pub fn enable_right_switch_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_disable_stop_r(false))
    }

    /// Keeps `motor` running when the right reference switch triggers.
    pub fn disable_right_switch_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_disable_stop_r(true))
    }

    /// Ramps `motor` down on switch events instead of stopping hard.
    pub fn enable_soft_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_soft_stop(true))
    }

    /// Stops `motor` immediately on switch events.
    pub fn disable_soft_stop(&mut self, motor: usize) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_soft_stop(false))
    }

    /// Selects which switch defines the reference position of `motor`.
    pub fn set_reference_switch(&mut self, motor: usize, switch: ReferenceSwitch) -> Result<(), CommE> {
        self.update_ref_conf(motor, |reg| reg.set_ref_rnl(switch))
    }

    /// Returns `true` once a reference switch event latched `X_ACTUAL`.
    pub fn position_latched(&mut self, motor: usize) -> Result<bool, CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(false);
        }
        let reg: RefConfMode = self.read_motor(motor)?;
        Ok(reg.lp())
    }

    fn update_ref_conf<F>(&mut self, motor: usize, mut mutate: F) -> Result<(), CommE>
    where
        F: FnMut(&mut RefConfMode),
    {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        self.update_motor(motor, |reg: &mut RefConfMode| mutate(reg))?;
        Ok(())
    }

    // ==================================================================
    // == Interface Configuration =======================================
    // ==================================================================
    /// Reads the `IF_CONFIGURATION` register.
    pub fn interface_configuration(&mut self) -> Result<IfConf, CommE> {
        self.read_common()
    }

    /// Selects step/direction or SPI driver chain output.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<(), CommE> {
        self.update_common(|reg: &mut IfConf| reg.set_en_sd(mode))?;
        Ok(())
    }

    /// Selects the active level of all reference switch inputs.
    pub fn set_reference_polarity(&mut self, polarity: ReferencePolarity) -> Result<(), CommE> {
        self.update_common(|reg: &mut IfConf| reg.set_inv_ref(polarity))?;
        Ok(())
    }

    /// Inverts the step output polarity.
    pub fn set_step_polarity_inverted(&mut self, inverted: bool) -> Result<(), CommE> {
        self.update_common(|reg: &mut IfConf| reg.set_inv_stp(inverted))?;
        Ok(())
    }

    /// Inverts the direction output polarity.
    pub fn set_dir_polarity_inverted(&mut self, inverted: bool) -> Result<(), CommE> {
        self.update_common(|reg: &mut IfConf| reg.set_inv_dir(inverted))?;
        Ok(())
    }

    /// Selects the motor whose position drives the position compare output.
    pub fn set_position_compare_motor(&mut self, motor: usize) -> Result<(), CommE> {
        if !Self::motor_in_range(motor) {
            return Ok(());
        }
        self.update_common(|reg: &mut IfConf| reg.set_pos_comp_sel(motor as u8))?;
        Ok(())
    }

    /// Enables or disables the right reference switch inputs.
    pub fn set_right_references_enabled(&mut self, enabled: bool) -> Result<(), CommE> {
        self.update_common(|reg: &mut IfConf| reg.set_en_refr(enabled))?;
        Ok(())
    }
}

fn saturating_hz(hz: u32) -> i32 {
    i32::try_from(hz).unwrap_or(i32::MAX)
}

fn unsigned_velocity_code(code: i32) -> u16 {
    code.clamp(0, VELOCITY_REGISTER_MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::DATAGRAM_SIZE;
    use crate::params::Access;
    use crate::registers::{
        REG_CLOCK_CONFIGURATION,
        REG_GLOBAL_PARAMETERS,
        REG_IF_CONFIGURATION,
        REG_REF_CONF_MODE,
        REG_SWITCHES,
    };
    use core::convert::Infallible;
    use embedded_hal_mock::eh1::spi::{Mock, Transaction};

    /// Register file standing in for a chip, answering with scripted status bytes.
    struct SimulatedChip {
        registers: [[u32; 16]; 4],
        statuses: Vec<u8>,
        transactions: usize,
    }

    impl SimulatedChip {
        fn new() -> Self {
            Self {
                registers: [[0; 16]; 4],
                statuses: Vec::new(),
                transactions: 0,
            }
        }

        fn register(&self, smda: u8, address: u8) -> u32 {
            self.registers[usize::from(smda)][usize::from(address)]
        }

        fn preload(&mut self, smda: u8, address: u8, value: u32) {
            self.registers[usize::from(smda)][usize::from(address)] = value;
        }
    }

    impl Tmc429Interface for SimulatedChip {
        type Error = Infallible;

        fn transfer(&mut self, frame: &mut [u8; DATAGRAM_SIZE]) -> core::result::Result<(), Self::Error> {
            let request = Request::decode(u32::from_be_bytes(*frame));
            let slot = &mut self.registers[usize::from(request.smda)][usize::from(request.address)];
            let data = match request.access {
                Access::Read => *slot,
                Access::Write => {
                    *slot = request.data;
                    0
                }
            };

            let status = self.statuses.get(self.transactions).copied().unwrap_or(0);
            self.transactions += 1;
            *frame = Response {
                status: Status::from(status),
                data,
            }
            .encode()
            .to_be_bytes();
            Ok(())
        }
    }

    fn driver(clock_frequency_mhz: u8) -> Tmc429<SimulatedChip> {
        let config = Config::new().clock_frequency_mhz(clock_frequency_mhz).build();
        Tmc429::new(SimulatedChip::new(), config)
    }

    #[test]
    fn check_version_reads_type_version_over_spi() {
        let expectations = [
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0x73, 0x00, 0x00, 0x00], vec![0x00, 0x42, 0x91, 0x01]),
            Transaction::transaction_end(),
        ];
        let mut spi = Mock::new(&expectations);
        let mut tmc = Tmc429::new_spi(spi.clone(), Config::default());

        assert!(tmc.check_version().unwrap());

        spi.done();
    }

    #[test]
    fn check_version_rejects_other_parts() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(SMDA_COMMON, REG_TYPE_VERSION, 0x0042_8101);
        assert!(!tmc.check_version().unwrap());
        assert_eq!(tmc.version().unwrap(), 0x0042_8101);
    }

    #[test]
    fn position_writes_are_sent_msb_first() {
        let expectations = [
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0x20, 0x00, 0x03, 0xE8], vec![0x00; 4]),
            Transaction::transaction_end(),
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0x00, 0xFF, 0xFF, 0xFF], vec![0x00; 4]),
            Transaction::transaction_end(),
        ];
        let mut spi = Mock::new(&expectations);
        let mut tmc = Tmc429::new_spi(spi.clone(), Config::default());

        tmc.set_position_target(1, 1_000).unwrap();
        tmc.set_position_target(0, -1).unwrap();

        spi.done();
    }

    #[test]
    fn status_tracks_every_response_including_writes() {
        let expectations = [
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0x03, 0x00, 0x00, 0x00], vec![0x01, 0x00, 0x00, 0x00]),
            Transaction::transaction_end(),
            Transaction::transaction_start(),
            Transaction::transfer_in_place(vec![0x02, 0x00, 0x00, 0x10], vec![0x80, 0x00, 0x00, 0x00]),
            Transaction::transaction_end(),
        ];
        let mut spi = Mock::new(&expectations);
        let mut tmc = Tmc429::new_spi(spi.clone(), Config::default());
        assert_eq!(tmc.status(), Status::new());

        tmc.read_register(0, 0x1).unwrap();
        assert!(tmc.status().at_target_position_0());

        tmc.write_register(0, 0x1, 0x10).unwrap();
        assert!(tmc.status().interrupt());
        assert!(!tmc.status().at_target_position_0());

        spi.done();
    }

    #[test]
    fn status_lags_one_transaction_behind() {
        let mut tmc = driver(16);
        // Status of transaction N describes the chip as of transaction N - 1.
        tmc.interface_mut().statuses = vec![0x00, 0x01, 0x03];

        tmc.position_actual(0).unwrap();
        assert_eq!(u8::from(tmc.status()), 0x00);

        tmc.set_position_target(0, 10).unwrap();
        assert_eq!(u8::from(tmc.status()), 0x01);

        tmc.position_actual(0).unwrap();
        assert_eq!(u8::from(tmc.status()), 0x03);
        assert!(tmc.status().switch_left(0));
    }

    #[test]
    fn min_max_velocity_at_16mhz_selects_pulse_div_3() {
        let mut tmc = driver(16);

        tmc.set_velocity_min_max_hz(0, 1_000, 50_000).unwrap();

        assert_eq!(tmc.pulse_div(0), 3);
        let chip = tmc.interface_mut();
        assert_eq!(chip.register(0, REG_CLOCK_CONFIGURATION), 0x3000);
        assert_eq!(chip.register(0, REG_V_MIN), 32);
        assert_eq!(chip.register(0, REG_V_MAX), 1_638);

        let max = tmc.velocity_max_hz(0).unwrap();
        assert!((49_950..=50_000).contains(&max), "velocity_max_hz = {max}");
        let min = tmc.velocity_min_hz(0).unwrap();
        assert!((969..=1_000).contains(&min), "velocity_min_hz = {min}");
    }

    #[test]
    fn pulse_div_update_preserves_other_clock_fields() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(1, REG_CLOCK_CONFIGURATION, 0x0F05);

        assert_eq!(tmc.set_optimal_pulse_div(1, 50_000).unwrap(), 3);
        assert_eq!(tmc.interface_mut().register(1, REG_CLOCK_CONFIGURATION), 0x3F05);

        let clk_config = tmc.clock_configuration(1).unwrap();
        assert_eq!(clk_config.pulse_div(), 3);
        assert_eq!(clk_config.ramp_div(), 0xF);
        assert_eq!(clk_config.usrs(), 5);
    }

    #[test]
    fn negative_target_velocity_survives_write_and_read() {
        let mut tmc = driver(16);
        tmc.set_velocity_min_max_hz(0, 0, 50_000).unwrap();

        tmc.set_velocity_target_hz(0, -1_000).unwrap();
        assert_eq!(tmc.interface_mut().register(0, REG_V_TARGET), 0xFE0);
        assert_eq!(tmc.velocity_target(0).unwrap(), -32);

        let hz = tmc.velocity_target_hz(0).unwrap();
        // One code is 30.5 Hz at pulse_div 3.
        assert!((hz + 1_000).abs() <= 31, "velocity_target_hz = {hz}");
    }

    #[test]
    fn velocity_codes_are_clamped_to_register_range() {
        let mut tmc = driver(16);

        tmc.set_velocity_min_max_hz(2, 0, 10_000_000).unwrap();
        assert_eq!(tmc.pulse_div(2), 0);
        assert_eq!(tmc.interface_mut().register(2, REG_V_MAX), 2_047);

        tmc.set_velocity_target_hz(2, -10_000_000).unwrap();
        assert_eq!(tmc.interface_mut().register(2, REG_V_TARGET), 0x800);
        assert_eq!(tmc.velocity_target(2).unwrap(), -2_048);

        tmc.set_velocity_max(2, u16::MAX).unwrap();
        assert_eq!(tmc.velocity_max(2).unwrap(), 2_047);
    }

    #[test]
    fn actual_velocity_is_sign_extended() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(2, REG_V_ACTUAL, 0xF00);

        assert_eq!(tmc.velocity_actual(2).unwrap(), -256);
        assert_eq!(tmc.velocity_actual_hz(2).unwrap(), -62_500);
    }

    #[test]
    fn positions_are_24_bit_signed() {
        let mut tmc = driver(16);

        tmc.set_position_actual(1, -5).unwrap();
        assert_eq!(tmc.interface_mut().register(1, REG_X_ACTUAL), 0xFF_FFFB);
        assert_eq!(tmc.position_actual(1).unwrap(), -5);

        tmc.set_position_target(1, i32::MAX).unwrap();
        assert_eq!(tmc.position_target(1).unwrap(), POSITION_MAX);
    }

    #[test]
    fn invalid_motor_returns_defaults_without_bus_traffic() {
        let mut tmc = driver(16);
        tmc.set_velocity_min_max_hz(0, 0, 50_000).unwrap();
        let baseline = tmc.interface_mut().transactions;

        for motor in [3usize, 255] {
            tmc.set_velocity_min_max_hz(motor, 10, 1_000).unwrap();
            tmc.set_velocity_target_hz(motor, -500).unwrap();
            tmc.set_velocity_min(motor, 1).unwrap();
            tmc.set_velocity_max(motor, 1).unwrap();
            tmc.set_velocity_target(motor, 1).unwrap();
            tmc.set_position_target(motor, 1).unwrap();
            tmc.set_position_actual(motor, 1).unwrap();
            tmc.set_mode(motor, Mode::Hold).unwrap();
            tmc.enable_left_switch_stop(motor).unwrap();
            tmc.disable_right_switch_stop(motor).unwrap();
            tmc.enable_soft_stop(motor).unwrap();
            tmc.set_reference_switch(motor, ReferenceSwitch::Right).unwrap();
            tmc.set_position_compare_motor(motor).unwrap();

            assert_eq!(tmc.set_optimal_pulse_div(motor, 1_000).unwrap(), 0);
            assert_eq!(tmc.refresh_pulse_div(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_min_hz(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_max_hz(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_target_hz(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_actual_hz(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_min(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_max(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_target(motor).unwrap(), 0);
            assert_eq!(tmc.velocity_actual(motor).unwrap(), 0);
            assert_eq!(tmc.position_target(motor).unwrap(), 0);
            assert_eq!(tmc.position_actual(motor).unwrap(), 0);
            assert_eq!(tmc.mode(motor).unwrap(), Mode::Ramp);
            assert!(!tmc.position_latched(motor).unwrap());
            assert_eq!(tmc.reference_configuration(motor).unwrap(), RefConfMode::new());
            assert_eq!(tmc.clock_configuration(motor).unwrap(), ClkConfig::new());
            assert_eq!(tmc.pulse_div(motor), 0);
        }

        assert_eq!(tmc.interface_mut().transactions, baseline);
        assert_eq!(tmc.pulse_div(0), 3);
        assert_eq!(tmc.pulse_div(1), 0);
        assert_eq!(tmc.pulse_div(2), 0);
    }

    #[test]
    fn set_mode_keeps_reference_bits() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(1, REG_REF_CONF_MODE, 0x0900);

        tmc.set_mode(1, Mode::Velocity).unwrap();
        assert_eq!(tmc.interface_mut().register(1, REG_REF_CONF_MODE), 0x0902);
        assert_eq!(tmc.mode(1).unwrap(), Mode::Velocity);
    }

    #[test]
    fn reference_switch_configuration() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(0, REG_REF_CONF_MODE, 0x0001_0100);
        assert!(tmc.position_latched(0).unwrap());

        tmc.enable_left_switch_stop(0).unwrap();
        tmc.disable_right_switch_stop(0).unwrap();
        tmc.enable_soft_stop(0).unwrap();
        tmc.set_reference_switch(0, ReferenceSwitch::Right).unwrap();

        let reg = tmc.reference_configuration(0).unwrap();
        assert!(!reg.disable_stop_l());
        assert!(reg.disable_stop_r());
        assert!(reg.soft_stop());
        assert_eq!(reg.ref_rnl(), ReferenceSwitch::Right);
        assert_eq!(tmc.interface_mut().register(0, REG_REF_CONF_MODE), 0x0001_0E00);

        tmc.disable_left_switch_stop(0).unwrap();
        tmc.enable_right_switch_stop(0).unwrap();
        tmc.disable_soft_stop(0).unwrap();
        tmc.set_reference_switch(0, ReferenceSwitch::Left).unwrap();
        assert_eq!(tmc.interface_mut().register(0, REG_REF_CONF_MODE), 0x0001_0100);
    }

    #[test]
    fn unchanged_register_is_not_rewritten() {
        let mut tmc = driver(16);

        tmc.enable_right_switch_stop(2).unwrap();
        assert_eq!(tmc.interface_mut().transactions, 1);

        tmc.disable_right_switch_stop(2).unwrap();
        assert_eq!(tmc.interface_mut().transactions, 3);
    }

    #[test]
    fn interface_configuration_setters() {
        let mut tmc = driver(16);

        tmc.set_reference_polarity(ReferencePolarity::ActiveLow).unwrap();
        tmc.set_step_polarity_inverted(true).unwrap();
        tmc.set_dir_polarity_inverted(true).unwrap();
        tmc.set_output_mode(OutputMode::StepDir).unwrap();
        tmc.set_position_compare_motor(2).unwrap();
        tmc.set_right_references_enabled(true).unwrap();
        assert_eq!(tmc.interface_mut().register(SMDA_COMMON, REG_IF_CONFIGURATION), 0x1B9);

        tmc.set_output_mode(OutputMode::Spi).unwrap();
        tmc.set_reference_polarity(ReferencePolarity::ActiveHigh).unwrap();
        tmc.set_step_polarity_inverted(false).unwrap();

        let reg = tmc.interface_configuration().unwrap();
        assert_eq!(reg.en_sd(), OutputMode::Spi);
        assert_eq!(reg.inv_ref(), ReferencePolarity::ActiveHigh);
        assert!(!reg.inv_stp());
        assert!(reg.inv_dir());
        assert_eq!(reg.pos_comp_sel(), 2);
        assert!(reg.en_refr());
    }

    #[test]
    fn switch_state_and_step_time() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(SMDA_COMMON, REG_SWITCHES, 0b00_0110);
        tmc.interface_mut().preload(SMDA_COMMON, REG_GLOBAL_PARAMETERS, 0x0F00);

        let switches = tmc.switch_state().unwrap();
        assert!(switches.left(0));
        assert!(switches.right(1));
        assert!(!switches.left(2));

        assert_eq!(tmc.step_time_us().unwrap(), 16.0);
    }

    #[test]
    fn init_loads_pulse_div_caches() {
        let mut tmc = driver(16);
        tmc.interface_mut().preload(0, REG_CLOCK_CONFIGURATION, 0x5000);
        tmc.interface_mut().preload(1, REG_CLOCK_CONFIGURATION, 0xD000);
        tmc.interface_mut().preload(2, REG_CLOCK_CONFIGURATION, 0xF000);

        tmc.init().unwrap();

        assert_eq!(tmc.pulse_div(0), 5);
        assert_eq!(tmc.pulse_div(1), 13);
        assert_eq!(tmc.pulse_div(2), PULSE_DIV_MAX);
    }

    #[test]
    fn init_rejects_zero_clock() {
        let mut tmc = driver(0);
        assert_eq!(tmc.init(), Err(Error::InvalidConfig));
        assert_eq!(tmc.interface_mut().transactions, 0);
    }

    #[test]
    fn clock_frequency_is_capped() {
        let mut tmc = driver(16);
        assert_eq!(tmc.velocity_max_max_hz(), 499_755);

        tmc.specify_clock_frequency_mhz(50);
        assert_eq!(tmc.clock_frequency_mhz(), 32);
        assert_eq!(tmc.velocity_max_max_hz(), 999_511);

        let (_, config) = tmc.release();
        assert_eq!(config.clock_frequency_mhz, 32);
    }
}

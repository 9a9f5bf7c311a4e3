//! Configuration primitives for the TMC429 driver.

use crate::conversion::CLOCK_FREQUENCY_MAX_MHZ;

/// Clock frequency assumed when none is given.
pub const DEFAULT_CLOCK_FREQUENCY_MHZ: u8 = 16;

/// Host-side configuration for the TMC429 driver.
///
/// None of these values live on the chip; they describe the board the chip
/// is soldered to and feed every unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Frequency of the chip's clock input in MHz, at most 32.
    pub clock_frequency_mhz: u8,
}

impl Config {
    /// Begins building a [`Config`] using the builder pattern.
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Checks whether this configuration is usable for unit conversion.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.clock_frequency_mhz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }

        Ok(())
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with [`Config::default()`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Sets the clock frequency, capped at the chip maximum.
    pub fn clock_frequency_mhz(mut self, clock_frequency_mhz: u8) -> Self {
        self.config.clock_frequency_mhz = cap_clock_frequency(clock_frequency_mhz);
        self
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_frequency_mhz: DEFAULT_CLOCK_FREQUENCY_MHZ,
        }
    }
}

/// Limits `clock_frequency_mhz` to [`CLOCK_FREQUENCY_MAX_MHZ`].
pub(crate) fn cap_clock_frequency(clock_frequency_mhz: u8) -> u8 {
    clock_frequency_mhz.min(CLOCK_FREQUENCY_MAX_MHZ)
}

/// Validation errors generated while verifying a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A 0 MHz clock makes every velocity conversion meaningless.
    ZeroClockFrequency,
}

//! SPI interface implementation built on top of `embedded-hal` `SpiDevice`.

use embedded_hal::spi::SpiDevice;

use super::{Tmc429Interface, DATAGRAM_SIZE};

/// SPI-based interface implementation for the TMC429 driver.
///
/// The wrapped device must be configured for SPI mode 3, MSB first. Chip
/// select handling is left to the `SpiDevice` implementation.
pub struct SpiInterface<SPI> {
    spi: SPI,
}

impl<SPI> SpiInterface<SPI> {
    /// Creates a new interface from the provided SPI device abstraction.
    pub const fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Provides mutable access to the wrapped SPI device.
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Consumes the interface and returns the owned SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> Tmc429Interface for SpiInterface<SPI>
where
    SPI: SpiDevice,
{
    type Error = SPI::Error;

    fn transfer(&mut self, frame: &mut [u8; DATAGRAM_SIZE]) -> core::result::Result<(), Self::Error> {
        self.spi.transfer_in_place(frame)
    }
}

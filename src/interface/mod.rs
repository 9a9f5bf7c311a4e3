//! Bus interface abstraction for the TMC429 driver.

pub mod spi;

/// Number of bytes exchanged per datagram.
pub const DATAGRAM_SIZE: usize = 4;

/// Abstraction over the low-level bus access required by the driver.
///
/// The TMC429 answers every datagram in the same full-duplex exchange, so
/// the only primitive needed is a single in-place transfer of one frame.
pub trait Tmc429Interface {
    /// Error type produced by the concrete bus implementation.
    type Error;

    /// Clocks `frame` out most significant byte first while replacing it with
    /// the bytes received from the chip. Chip select must stay asserted for
    /// the whole frame.
    fn transfer(&mut self, frame: &mut [u8; DATAGRAM_SIZE]) -> core::result::Result<(), Self::Error>;
}

//! Error handling primitives for the TMC429 driver.

use core::fmt;

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the driver.
///
/// Out-of-range motor indices are not errors: per-motor accessors return a
/// default value instead and leave the bus untouched. Status flags reported
/// by the chip are not errors either; inspect [`Tmc429::status`](crate::Tmc429::status).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus transport failed to exchange a datagram.
    Interface(E),
    /// The host configuration cannot be used for unit conversion.
    InvalidConfig,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Interface(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interface(err) => write!(f, "datagram exchange failed: {err:?}"),
            Self::InvalidConfig => f.write_str("invalid TMC429 configuration"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

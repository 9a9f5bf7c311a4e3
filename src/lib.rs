#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

mod error;

pub mod config;
pub mod conversion;
pub mod datagram;
pub mod device;
pub mod interface;
pub mod params;
pub mod registers;

pub use crate::config::Config;
pub use crate::device::Tmc429;
pub use crate::error::{Error, Result};
pub use crate::params::Mode;

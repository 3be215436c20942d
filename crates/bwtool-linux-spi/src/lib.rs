//! Linux spidev transport
//!
//! Talks to boards wired directly to an SPI controller through the kernel's
//! `/dev/spidevX.Y` interface.

mod device;
mod error;

pub use device::{SpidevBus, SpidevConfig};
pub use error::{Result, SpidevError};

//! Core transaction protocol for BitWizard SPI/I2C expansion boards
//!
//! This crate implements the framed register request/response protocol the
//! boards speak, independent of the physical medium. Physical bindings
//! (spidev, i2c-dev, USB serial bridge) live in their own crates and plug in
//! through the [`BusTransport`] trait.
//!
//! Two protocol levels are supported:
//! - the basic register protocol (no reply validation), and
//! - "mode2", a reliability overlay adding a transaction id, a CRC16
//!   checksum and a busy-retry loop, for bus runs long enough that errors
//!   are likely.

pub mod crc;
pub mod engine;
pub mod error;
pub mod frame;
pub mod mode2;
pub mod tid;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_bus;

pub use engine::{Capabilities, Engine, EngineConfig, ScanHit};
pub use error::{Error, Result, TransportError};
pub use frame::{ReadSpec, Width, WriteSpec};
pub use tid::TidCounter;
pub use transport::{BusTransport, MAX_FRAME};

//! USB serial bridge transports
//!
//! The BitWizard usbio board presents a CDC-ACM serial port and forwards
//! framed SPI or I2C transactions to boards behind it. One level of RS485
//! forwarding lets a bridge relay to a remote bridge by id.

mod device;
mod error;
pub mod protocol;

pub use device::{UsbConfig, UsbI2cBus, UsbSpiBus};
pub use error::{Result, UsbError};
pub use protocol::Rs485Ids;

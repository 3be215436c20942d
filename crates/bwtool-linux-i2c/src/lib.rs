//! Linux i2c-dev transport
//!
//! Talks to boards on an I2C bus through the kernel's `/dev/i2c-N`
//! interface.

mod device;
mod error;

pub use device::{I2cDevBus, I2cDevConfig};
pub use error::{I2cDevError, Result};

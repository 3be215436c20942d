//! Error types for the i2c-dev transport

use thiserror::Error;

/// i2c-dev specific errors
#[derive(Debug, Error)]
pub enum I2cDevError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Device not specified
    #[error("No device specified. Use /dev/i2c-N")]
    NoDevice,
}

/// Result type for i2c-dev operations
pub type Result<T> = std::result::Result<T, I2cDevError>;

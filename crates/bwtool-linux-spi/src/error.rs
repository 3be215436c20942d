//! Error types for the spidev transport

use thiserror::Error;

/// spidev specific errors
#[derive(Debug, Error)]
pub enum SpidevError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to {mode}: {source}")]
    SetModeFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// Device not specified
    #[error("No device specified. Use /dev/spidevX.Y")]
    NoDevice,
}

/// Result type for spidev operations
pub type Result<T> = std::result::Result<T, SpidevError>;

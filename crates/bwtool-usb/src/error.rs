//! Error types for the USB bridge transports

use thiserror::Error;

/// USB bridge specific errors
#[derive(Debug, Error)]
pub enum UsbError {
    /// Failed to open the serial port
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Device not specified
    #[error("No device specified. Use /dev/ttyACM0 or similar")]
    NoDevice,
}

/// Result type for USB bridge operations
pub type Result<T> = std::result::Result<T, UsbError>;

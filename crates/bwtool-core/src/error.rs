//! Error types for the transaction protocol

use std::path::PathBuf;
use thiserror::Error;

/// Hard failures at the byte exchange level.
///
/// Any of these means the physical link itself misbehaved. There is no retry
/// at this layer; callers propagate the error and the process exits with a
/// diagnostic.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying bus I/O call failed
    #[error("bus I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Device returned or accepted fewer bytes than requested
    #[error("short {dir} on bus: {got} of {want} bytes")]
    Short {
        dir: &'static str,
        got: usize,
        want: usize,
    },

    /// A bridge response header field did not match what was sent
    #[error("invalid {field} in bridge response: got {got:#04x}, expected {want:#04x}")]
    BadResponse {
        field: &'static str,
        got: u8,
        want: u8,
    },

    /// Bridge executed the command but reported the bus transaction failed
    #[error("bridge reported transaction failure: status {0:#04x}")]
    BridgeStatus(u8),
}

/// Errors surfaced by the transaction engine
#[derive(Debug, Error)]
pub enum Error {
    /// Exchange with the device failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Frame does not fit the transaction buffer
    #[error("frame of {len} bytes exceeds the {max} byte transaction buffer")]
    FrameTooLong { len: usize, max: usize },

    /// Persisted transaction-id counter could not be updated
    #[error("can't update tid counter {path}: {source}")]
    TidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

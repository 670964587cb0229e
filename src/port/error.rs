//! Port-specific error types.
//!
//! Transport failures are kept apart from harness-level errors so the reader
//! loop can decide locally whether a failure ends the task.

use thiserror::Error;

/// Errors that can occur while reading or writing a stream source.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial device was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Port configuration failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source has been closed; no further reads or writes are accepted.
    #[error("Stream source '{0}' is closed")]
    NotOpen(String),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a NotOpen error for the named source.
    pub fn not_open(source_name: impl Into<String>) -> Self {
        Self::NotOpen(source_name.into())
    }

    /// Whether this error means the peer or pipe has gone away for good.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::NotOpen(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

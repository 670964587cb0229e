//! Core traits for stream source abstraction.
//!
//! Defines the `StreamSource` trait that lets serial ports, child process
//! pipes and in-memory mocks be driven by the same reader loop.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration parameters for opening a serial device.
///
/// Only the baud rate and read timeout are configurable; framing is left at
/// the transport's 8N1 default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Read timeout. A read that sees no data within this window reports
    /// [`ReadOutcome::TimedOut`].
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfiguration {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }
}

/// Result of a single read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were placed at the start of the buffer.
    Data(usize),
    /// No data arrived within the read timeout. Not end-of-stream.
    TimedOut,
    /// The source reported end-of-stream.
    Eof,
}

/// Shared open/closed flag for a stream source.
///
/// Every clone observes the same state. Closing is idempotent and is the only
/// way to stop a reader task bound to the source.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    open: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Create a handle in the open state.
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Mark the source closed. Returns `true` if this call performed the transition.
    pub fn close(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for byte-oriented endpoints read and written by the harness.
///
/// A source is owned by exactly one reader task once the owning component
/// has started it; the owner keeps only a [`CloseHandle`].
pub trait StreamSource: Send + std::fmt::Debug {
    /// Perform one read into `buffer`, bounded by the source's timeout.
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError>;

    /// Write all of `data` to the source.
    ///
    /// Returns the number of bytes written. Fails with [`PortError::NotOpen`]
    /// once the source has been closed.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Whether the source is still open.
    fn is_open(&self) -> bool;

    /// Get the name/path of this source.
    fn name(&self) -> &str;

    /// A handle that closes this source from another thread.
    fn close_handle(&self) -> CloseHandle;

    /// Upper bound of a single read, `None` for blocking sources.
    fn read_timeout(&self) -> Option<Duration> {
        None
    }
}

impl<S: StreamSource + ?Sized> StreamSource for Box<S> {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError> {
        (**self).read_chunk(buffer)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        (**self).write_bytes(data)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn close_handle(&self) -> CloseHandle {
        (**self).close_handle()
    }

    fn read_timeout(&self) -> Option<Duration> {
        (**self).read_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_close_handle_is_shared_and_idempotent() {
        let handle = CloseHandle::new();
        let other = handle.clone();
        assert!(other.is_open());

        assert!(handle.close());
        assert!(!other.is_open());
        assert!(!other.close(), "second close must be a no-op");
    }
}

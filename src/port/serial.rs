//! Serial device source.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own
//! `StreamSource` trait so the reader loop can drive real (or tty0tty
//! virtual) devices.

use super::error::PortError;
use super::traits::{CloseHandle, PortConfiguration, ReadOutcome, StreamSource};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Serial port source wrapping `serialport::SerialPort`.
pub struct SerialSource {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
    closed: CloseHandle,
}

impl SerialSource {
    /// Open a serial port with the given configuration.
    ///
    /// # Arguments
    /// * `port_name` - The system path to the serial port (e.g., "/dev/tnt0")
    /// * `config` - Baud rate and read timeout
    ///
    /// # Example
    /// ```no_run
    /// use spcom_harness::port::{PortConfiguration, SerialSource};
    ///
    /// let port = SerialSource::open("/dev/tnt0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        if config.baud_rate == 0 {
            return Err(PortError::config("baud rate must be non-zero"));
        }

        let port = serialport::new(port_name, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                serialport::ErrorKind::Io(ErrorKind::NotFound) => PortError::not_found(port_name),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port,
            name: port_name.to_string(),
            closed: CloseHandle::new(),
        })
    }

    /// Get a reference to the underlying serialport implementation.
    pub fn as_raw(&self) -> &dyn serialport::SerialPort {
        &*self.port
    }
}

impl StreamSource for SerialSource {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError> {
        if !self.closed.is_open() {
            return Err(PortError::not_open(&self.name));
        }
        match self.port.read(buffer) {
            // Some drivers report an expired timeout as a zero-length read.
            Ok(0) => Ok(ReadOutcome::TimedOut),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(ReadOutcome::TimedOut),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::TimedOut),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        if !self.closed.is_open() {
            return Err(PortError::not_open(&self.name));
        }
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(data.len())
    }

    fn is_open(&self) -> bool {
        self.closed.is_open()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close_handle(&self) -> CloseHandle {
        self.closed.clone()
    }

    fn read_timeout(&self) -> Option<Duration> {
        Some(self.port.timeout())
    }
}

impl std::fmt::Debug for SerialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialSource")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .field("open", &self.closed.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let config = PortConfiguration::default();
        let result = SerialSource::open("/dev/nonexistent_port_12345", &config);

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(PortError::Serial(_)) | Err(PortError::Io(_)) => {
                // Some platforms report a missing device as a generic I/O failure.
            }
            other => panic!("Expected NotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_zero_baud_rejected() {
        let config = PortConfiguration::new(0, std::time::Duration::from_millis(10));
        let result = SerialSource::open("/dev/tnt0", &config);
        assert!(matches!(result, Err(PortError::Config(_))));
    }
}

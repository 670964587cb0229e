//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` pair that behaves like a virtual null-modem
//! (tty0tty `/dev/tnt0 <=> /dev/tnt1`): bytes written on one end become
//! readable on the other. Reads block up to the configured timeout.

use super::error::PortError;
use super::traits::{CloseHandle, ReadOutcome, StreamSource};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-end state of the link.
#[derive(Debug, Default)]
struct EndState {
    /// Bytes waiting to be read by this end.
    rx: VecDeque<u8>,
    /// Log of every write issued by this end.
    write_log: Vec<Vec<u8>>,
    /// Error kind returned by the next read, if any.
    fail_next_read: Option<ErrorKind>,
}

#[derive(Debug, Default)]
struct Link {
    ends: Mutex<[EndState; 2]>,
    readable: Condvar,
}

/// Mock serial port implementation for testing.
///
/// This implementation allows you to:
/// - Connect two ends back to back and exchange bytes between threads
/// - Inject bytes directly into an end's receive buffer
/// - Inspect what an end has written
/// - Simulate read failures
///
/// Clones share the same end (same buffers, same open flag).
///
/// # Example
/// ```
/// use spcom_harness::port::{MockSerialPort, ReadOutcome, StreamSource};
///
/// let (mut device, mut client) = MockSerialPort::pair("tnt0", "tnt1");
///
/// client.write_bytes(b"Hello").unwrap();
///
/// let mut buffer = [0u8; 16];
/// let outcome = device.read_chunk(&mut buffer).unwrap();
/// assert_eq!(outcome, ReadOutcome::Data(5));
/// assert_eq!(&buffer[..5], b"Hello");
/// assert_eq!(client.write_log(), vec![b"Hello".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    side: usize,
    link: Arc<Link>,
    closed: CloseHandle,
    timeout: Duration,
}

impl MockSerialPort {
    /// Create two connected ends.
    pub fn pair(a: impl Into<String>, b: impl Into<String>) -> (Self, Self) {
        let link = Arc::new(Link::default());
        let timeout = Duration::from_millis(100);
        (
            Self {
                name: a.into(),
                side: 0,
                link: Arc::clone(&link),
                closed: CloseHandle::new(),
                timeout,
            },
            Self {
                name: b.into(),
                side: 1,
                link,
                closed: CloseHandle::new(),
                timeout,
            },
        )
    }

    /// Create a single end whose peer is discarded.
    pub fn new(name: impl Into<String>) -> Self {
        Self::pair(name, "null").0
    }

    /// Set the read timeout used by [`StreamSource::read_chunk`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Enqueue bytes to be returned by subsequent reads on this end.
    pub fn enqueue_read(&self, data: &[u8]) {
        let mut ends = self.link.ends.lock();
        ends[self.side].rx.extend(data);
        self.link.readable.notify_all();
    }

    /// Get a copy of all data written by this end.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.link.ends.lock()[self.side].write_log.clone()
    }

    /// Clear this end's write log.
    pub fn clear_write_log(&self) {
        self.link.ends.lock()[self.side].write_log.clear();
    }

    /// Make the next read on this end fail with the given I/O error kind.
    pub fn fail_next_read(&self, kind: ErrorKind) {
        let mut ends = self.link.ends.lock();
        ends[self.side].fail_next_read = Some(kind);
        self.link.readable.notify_all();
    }

    /// Number of bytes waiting to be read on this end.
    pub fn available_bytes(&self) -> usize {
        self.link.ends.lock()[self.side].rx.len()
    }

    /// Close this end and wake any blocked reader.
    pub fn close(&self) {
        self.closed.close();
        let _ends = self.link.ends.lock();
        self.link.readable.notify_all();
    }

    /// Read from this end until `expected` bytes have arrived or `timeout` elapses.
    pub fn read_exact_timeout(&self, expected: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(expected);
        let mut ends = self.link.ends.lock();
        loop {
            let rx = &mut ends[self.side].rx;
            while out.len() < expected {
                match rx.pop_front() {
                    Some(b) => out.push(b),
                    None => break,
                }
            }
            if out.len() >= expected || Instant::now() >= deadline {
                return out;
            }
            self.link.readable.wait_until(&mut ends, deadline);
        }
    }
}

impl StreamSource for MockSerialPort {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError> {
        let deadline = Instant::now() + self.timeout;
        let mut ends = self.link.ends.lock();
        loop {
            if !self.closed.is_open() {
                return Err(PortError::not_open(&self.name));
            }

            let end = &mut ends[self.side];
            if let Some(kind) = end.fail_next_read.take() {
                return Err(PortError::Io(std::io::Error::new(kind, "injected read failure")));
            }

            if !end.rx.is_empty() {
                let mut bytes_read = 0;
                for byte in buffer.iter_mut() {
                    match end.rx.pop_front() {
                        Some(b) => {
                            *byte = b;
                            bytes_read += 1;
                        }
                        None => break,
                    }
                }
                return Ok(ReadOutcome::Data(bytes_read));
            }

            if Instant::now() >= deadline {
                return Ok(ReadOutcome::TimedOut);
            }
            self.link.readable.wait_until(&mut ends, deadline);
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        if !self.closed.is_open() {
            return Err(PortError::not_open(&self.name));
        }

        let mut ends = self.link.ends.lock();
        ends[self.side].write_log.push(data.to_vec());
        ends[1 - self.side].rx.extend(data);
        self.link.readable.notify_all();
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
        Some(self.timeout)
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .field("open", &self.closed.is_open())
            .finish()
    }
}

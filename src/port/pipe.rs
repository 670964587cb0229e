//! Child process pipe source.

use super::error::PortError;
use super::traits::{CloseHandle, ReadOutcome, StreamSource};
use std::io::{ErrorKind, Read};

/// Read-only source over a process output pipe.
///
/// Reads block until the child produces output or closes the pipe. A
/// zero-length read is end-of-stream, after which the source reports closed.
pub struct PipeSource<R> {
    reader: R,
    name: String,
    closed: CloseHandle,
}

impl<R: Read + Send> PipeSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            closed: CloseHandle::new(),
        }
    }
}

impl<R: Read + Send> StreamSource for PipeSource<R> {
    fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError> {
        loop {
            match self.reader.read(buffer) {
                Ok(0) => {
                    self.closed.close();
                    return Ok(ReadOutcome::Eof);
                }
                Ok(n) => return Ok(ReadOutcome::Data(n)),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.closed.close();
                    return Err(PortError::Io(e));
                }
            }
        }
    }

    fn write_bytes(&mut self, _data: &[u8]) -> Result<usize, PortError> {
        Err(PortError::Io(std::io::Error::new(
            ErrorKind::Unsupported,
            format!("pipe source '{}' is read-only", self.name),
        )))
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
}

impl<R> std::fmt::Debug for PipeSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeSource")
            .field("name", &self.name)
            .field("open", &self.closed.is_open())
            .finish()
    }
}

//! Framed reader loop.
//!
//! A reader task owns one [`StreamSource`] and repeatedly performs a single
//! framed read (raw or line-terminated), handing every non-empty chunk to a
//! [`ChunkSink`]. Timeouts only pace the loop. The loop ends when the source
//! is closed, reports end-of-stream, or fails; failures are logged and never
//! re-raised across the thread boundary.

use crate::error::{HarnessError, HarnessResult};
use crate::port::{PortError, ReadOutcome, StreamSource};
use crate::queue::ChunkSender;
use memchr::memchr;
use serde::{Deserialize, Serialize};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn, Span};

/// Size of the buffer handed to each raw read.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Longest unterminated line held back in line mode.
pub const MAX_LINE_LENGTH: usize = 4096;

/// How a single read attempt is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Whatever bytes are available after one read.
    #[default]
    Raw,
    /// Bytes up to and including `\n`, or the partial line pending once the
    /// source's read timeout has elapsed.
    Line,
}

/// One framed read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk(Vec<u8>),
    /// The read timed out with nothing to deliver.
    Idle,
    /// End-of-stream, carrying any unterminated bytes still pending.
    Eof(Vec<u8>),
}

/// Turns raw reads into frames according to a [`ReadMode`].
#[derive(Debug)]
pub struct Framer {
    mode: ReadMode,
    buffer: Vec<u8>,
    pending: Vec<u8>,
}

impl Framer {
    pub fn new(mode: ReadMode) -> Self {
        Self {
            mode,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            pending: Vec::new(),
        }
    }

    /// Perform one read attempt on `source`.
    ///
    /// In line mode the whole attempt is bounded by the source's read
    /// timeout, so a peer trickling bytes without a newline still gets its
    /// partial line back once per timeout. Unterminated lines longer than
    /// [`MAX_LINE_LENGTH`] are flushed as they are.
    pub fn next_frame<S>(&mut self, source: &mut S) -> Result<Frame, PortError>
    where
        S: StreamSource + ?Sized,
    {
        match self.mode {
            ReadMode::Raw => match source.read_chunk(&mut self.buffer)? {
                ReadOutcome::Data(n) => Ok(Frame::Chunk(self.buffer[..n].to_vec())),
                ReadOutcome::TimedOut => Ok(Frame::Idle),
                ReadOutcome::Eof => Ok(Frame::Eof(Vec::new())),
            },
            ReadMode::Line => {
                let deadline = source.read_timeout().map(|t| Instant::now() + t);
                self.next_line(source, deadline)
            }
        }
    }

    fn next_line<S>(&mut self, source: &mut S, deadline: Option<Instant>) -> Result<Frame, PortError>
    where
        S: StreamSource + ?Sized,
    {
        loop {
            if let Some(pos) = memchr(b'\n', &self.pending) {
                let rest = self.pending.split_off(pos + 1);
                return Ok(Frame::Chunk(std::mem::replace(&mut self.pending, rest)));
            }
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            if !self.pending.is_empty() && (expired || self.pending.len() >= MAX_LINE_LENGTH) {
                return Ok(Frame::Chunk(std::mem::take(&mut self.pending)));
            }
            match source.read_chunk(&mut self.buffer)? {
                ReadOutcome::Data(n) => self.pending.extend_from_slice(&self.buffer[..n]),
                ReadOutcome::TimedOut if self.pending.is_empty() => return Ok(Frame::Idle),
                ReadOutcome::TimedOut => {
                    return Ok(Frame::Chunk(std::mem::take(&mut self.pending)))
                }
                ReadOutcome::Eof => return Ok(Frame::Eof(std::mem::take(&mut self.pending))),
            }
        }
    }
}

/// Receiver of a reader loop's output.
///
/// All methods run on the reader thread, which is the only thread touching
/// the source while the loop is alive. Returning an error ends the loop.
pub trait ChunkSink<S: ?Sized>: Send {
    /// Called with every non-empty chunk, in read order.
    fn on_chunk(&mut self, source: &mut S, chunk: Vec<u8>) -> Result<(), PortError>;

    /// Called after every read attempt, whether or not it produced data.
    fn on_cycle(&mut self, _source: &mut S) -> Result<(), PortError> {
        Ok(())
    }

    /// Called once when the source reports end-of-stream.
    fn on_end(&mut self) {}
}

impl<S: ?Sized> ChunkSink<S> for ChunkSender {
    fn on_chunk(&mut self, _source: &mut S, chunk: Vec<u8>) -> Result<(), PortError> {
        if self.send(chunk) {
            Ok(())
        } else {
            Err(PortError::not_open("delivery queue"))
        }
    }

    fn on_end(&mut self) {
        self.finish();
    }
}

/// Why a reader loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The source was closed by its owner.
    Closed,
    /// The source reported end-of-stream.
    Eof,
    /// A read failed.
    ReadFailed(String),
    /// The sink refused a chunk or a cycle action failed.
    SinkFailed(String),
}

/// Run the loop on the current thread until it exits.
pub fn run_reader_loop<S, K>(source: &mut S, mode: ReadMode, sink: &mut K) -> LoopExit
where
    S: StreamSource + ?Sized,
    K: ChunkSink<S> + ?Sized,
{
    let mut framer = Framer::new(mode);

    loop {
        if !source.is_open() {
            return LoopExit::Closed;
        }

        let frame = match framer.next_frame(source) {
            Ok(frame) => frame,
            Err(_) if !source.is_open() => return LoopExit::Closed,
            Err(e) => {
                warn!(source = source.name(), error = %e, "read failed, stopping reader");
                return LoopExit::ReadFailed(e.to_string());
            }
        };

        let result = match frame {
            Frame::Chunk(chunk) => sink.on_chunk(source, chunk),
            Frame::Idle => Ok(()),
            Frame::Eof(rest) => {
                if !rest.is_empty() {
                    if let Err(e) = sink.on_chunk(source, rest) {
                        warn!(source = source.name(), error = %e, "sink failed on final bytes");
                    }
                }
                sink.on_end();
                return LoopExit::Eof;
            }
        };

        if let Err(e) = result.and_then(|()| sink.on_cycle(source)) {
            if !source.is_open() {
                return LoopExit::Closed;
            }
            warn!(source = source.name(), error = %e, "sink failed, stopping reader");
            return LoopExit::SinkFailed(e.to_string());
        }
    }
}

/// Handle to a running reader thread.
#[derive(Debug)]
pub struct ReaderTask {
    name: String,
    handle: Option<JoinHandle<LoopExit>>,
    exit: Option<LoopExit>,
}

impl ReaderTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the loop has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Block until the loop returns. Meant for teardown only.
    pub fn join(&mut self) -> HarnessResult<LoopExit> {
        if let Some(handle) = self.handle.take() {
            let exit = handle
                .join()
                .map_err(|_| HarnessError::ReaderPanicked(self.name.clone()))?;
            self.exit = Some(exit);
        }
        self.exit
            .clone()
            .ok_or_else(|| HarnessError::ReaderPanicked(self.name.clone()))
    }

    /// Like [`join`](Self::join) but gives up after `timeout`.
    pub fn join_timeout(&mut self, timeout: Duration) -> HarnessResult<LoopExit> {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!("reader task '{}'", self.name)));
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.join()
    }
}

/// Start a reader loop over `source` on its own thread.
///
/// The thread enters `span` so everything the loop logs carries the owning
/// component's context.
pub fn spawn_reader<S, K>(source: S, mode: ReadMode, sink: K, span: Span) -> HarnessResult<ReaderTask>
where
    S: StreamSource + 'static,
    K: ChunkSink<S> + 'static,
{
    let name = format!("reader:{}", source.name());
    let handle = thread::Builder::new().name(name.clone()).spawn(move || {
        let _entered = span.enter();
        let mut source = source;
        let mut sink = sink;
        debug!(source = source.name(), ?mode, "reader loop started");
        let exit = run_reader_loop(&mut source, mode, &mut sink);
        debug!(source = source.name(), ?exit, "reader loop finished");
        exit
    })?;

    Ok(ReaderTask {
        name,
        handle: Some(handle),
        exit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{CloseHandle, MockSerialPort};
    use crate::queue::delivery_queue;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    /// Source that replays a fixed script of read outcomes, then reports EOF.
    #[derive(Debug)]
    struct ScriptedSource {
        reads: VecDeque<Option<Vec<u8>>>,
        closed: CloseHandle,
        timeout: Option<Duration>,
    }

    impl ScriptedSource {
        /// `None` entries are timeouts.
        fn new(reads: Vec<Option<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into(),
                closed: CloseHandle::new(),
                timeout: None,
            }
        }

        fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = Some(timeout);
            self
        }
    }

    impl StreamSource for ScriptedSource {
        fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<ReadOutcome, PortError> {
            match self.reads.pop_front() {
                Some(Some(data)) => {
                    buffer[..data.len()].copy_from_slice(&data);
                    Ok(ReadOutcome::Data(data.len()))
                }
                Some(None) => Ok(ReadOutcome::TimedOut),
                None => Ok(ReadOutcome::Eof),
            }
        }

        fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
            Ok(data.len())
        }

        fn is_open(&self) -> bool {
            self.closed.is_open()
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn close_handle(&self) -> CloseHandle {
            self.closed.clone()
        }

        fn read_timeout(&self) -> Option<Duration> {
            self.timeout
        }
    }

    /// Refuses every chunk but still counts the end.
    #[derive(Default)]
    struct Refuser {
        ended: usize,
    }

    impl<S: ?Sized> ChunkSink<S> for Refuser {
        fn on_chunk(&mut self, _source: &mut S, _chunk: Vec<u8>) -> Result<(), PortError> {
            Err(PortError::not_open("refuser"))
        }

        fn on_end(&mut self) {
            self.ended += 1;
        }
    }

    /// Records everything the loop hands over.
    #[derive(Default)]
    struct Recorder {
        chunks: Vec<Vec<u8>>,
        cycles: usize,
        ended: usize,
    }

    impl<S: ?Sized> ChunkSink<S> for Recorder {
        fn on_chunk(&mut self, _source: &mut S, chunk: Vec<u8>) -> Result<(), PortError> {
            self.chunks.push(chunk);
            Ok(())
        }

        fn on_cycle(&mut self, _source: &mut S) -> Result<(), PortError> {
            self.cycles += 1;
            Ok(())
        }

        fn on_end(&mut self) {
            self.ended += 1;
        }
    }

    fn bytes(s: &str) -> Option<Vec<u8>> {
        Some(s.as_bytes().to_vec())
    }

    #[test]
    fn test_raw_mode_skips_timeouts() {
        let mut source = ScriptedSource::new(vec![bytes("ab"), None, bytes("c"), None]);
        let mut sink = Recorder::default();

        let exit = run_reader_loop(&mut source, ReadMode::Raw, &mut sink);

        assert_eq!(exit, LoopExit::Eof);
        assert_eq!(sink.chunks, vec![b"ab".to_vec(), b"c".to_vec()]);
        assert_eq!(sink.cycles, 4, "every attempt, timed out or not, is a cycle");
        assert_eq!(sink.ended, 1);
    }

    #[test]
    fn test_line_mode_splits_and_joins_reads() {
        let mut source = ScriptedSource::new(vec![bytes("he"), bytes("llo\nwor"), bytes("ld\n")]);
        let mut sink = Recorder::default();

        run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(sink.chunks, vec![b"hello\n".to_vec(), b"world\n".to_vec()]);
    }

    #[test]
    fn test_line_mode_flushes_partial_line_on_timeout() {
        let mut source = ScriptedSource::new(vec![bytes("par"), None, None]);
        let mut sink = Recorder::default();

        run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(sink.chunks, vec![b"par".to_vec()]);
        assert_eq!(sink.cycles, 2);
    }

    #[test]
    fn test_line_mode_flushes_trickle_once_read_timeout_elapses() {
        // Data keeps arriving, so no single read ever times out.
        let mut source = ScriptedSource::new(vec![bytes("a"), bytes("b"), bytes("c")])
            .with_timeout(Duration::ZERO);
        let mut sink = Recorder::default();

        run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(sink.chunks, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(sink.cycles, 3);
    }

    #[test]
    fn test_line_mode_flushes_overlong_line() {
        let block = Some(vec![b'x'; 1000]);
        let mut reads = vec![block; 5];
        reads.push(bytes("\n"));
        let mut source = ScriptedSource::new(reads);
        let mut sink = Recorder::default();

        run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(sink.chunks.len(), 2);
        assert!(sink.chunks[0].len() >= MAX_LINE_LENGTH);
        assert!(sink.chunks[0].len() < MAX_LINE_LENGTH + READ_BUFFER_SIZE);
        assert_eq!(sink.chunks[1], b"\n".to_vec());
    }

    #[test]
    fn test_sink_failure_on_final_bytes_still_ends() {
        let mut source = ScriptedSource::new(vec![bytes("tail")]);
        let mut sink = Refuser::default();

        let exit = run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(exit, LoopExit::Eof);
        assert_eq!(sink.ended, 1);
    }

    #[test]
    fn test_eof_delivers_pending_bytes_then_ends() {
        let mut source = ScriptedSource::new(vec![bytes("a\nb")]);
        let (tx, mut rx) = delivery_queue();
        let mut sink = tx;

        let exit = run_reader_loop(&mut source, ReadMode::Line, &mut sink);

        assert_eq!(exit, LoopExit::Eof);
        assert_eq!(rx.drain_all(), b"a\nb".to_vec());
        assert!(rx.is_finished());
    }

    #[test]
    fn test_closed_source_exits_without_forwarding() {
        let mut source = ScriptedSource::new(vec![bytes("never")]);
        source.close_handle().close();
        let mut sink = Recorder::default();

        assert_eq!(run_reader_loop(&mut source, ReadMode::Raw, &mut sink), LoopExit::Closed);
        assert!(sink.chunks.is_empty());
        assert_eq!(sink.ended, 0);
    }

    #[test]
    fn test_read_error_is_fatal() {
        let mut source = MockSerialPort::new("tnt0");
        source.fail_next_read(std::io::ErrorKind::BrokenPipe);
        let mut sink = Recorder::default();

        let exit = run_reader_loop(&mut source, ReadMode::Raw, &mut sink);
        assert!(matches!(exit, LoopExit::ReadFailed(_)), "{exit:?}");
    }

    #[test]
    fn test_spawned_reader_stops_within_one_timeout_after_close() {
        let timeout = Duration::from_millis(50);
        let (device, _client) = MockSerialPort::pair("tnt0", "tnt1");
        let device = device.with_timeout(timeout);
        let closer = device.close_handle();
        let (tx, _rx) = delivery_queue();

        let mut task = spawn_reader(device, ReadMode::Raw, tx, Span::none()).unwrap();
        thread::sleep(Duration::from_millis(10));
        closer.close();

        let exit = task.join_timeout(timeout * 4).unwrap();
        assert_eq!(exit, LoopExit::Closed);
        assert!(task.is_finished());
        assert_eq!(task.join().unwrap(), LoopExit::Closed, "join is repeatable");
    }

    proptest! {
        #[test]
        fn line_framing_ignores_read_fragmentation(
            data in proptest::collection::vec(prop_oneof![Just(b'\n'), any::<u8>()], 0..200),
            cuts in proptest::collection::vec(1usize..32, 0..40),
        ) {
            let mut reads = Vec::new();
            let mut rest: &[u8] = &data;
            for cut in cuts {
                if rest.is_empty() {
                    break;
                }
                let n = cut.min(rest.len());
                reads.push(Some(rest[..n].to_vec()));
                rest = &rest[n..];
            }
            if !rest.is_empty() {
                reads.push(Some(rest.to_vec()));
            }

            let mut source = ScriptedSource::new(reads);
            let mut sink = Recorder::default();
            run_reader_loop(&mut source, ReadMode::Line, &mut sink);

            let expected: Vec<Vec<u8>> = data
                .split_inclusive(|b| *b == b'\n')
                .map(|line| line.to_vec())
                .collect();
            prop_assert_eq!(sink.chunks, expected);
        }
    }
}

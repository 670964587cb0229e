//! Interactive driver for the tool under test.
//!
//! [`ToolProcess`] owns the child's stdin and a reader task draining its
//! stdout into a delivery queue. Writes go straight to stdin on the caller's
//! thread; reads pop whatever the reader has queued.

use super::command::{StderrMode, ToolCommand};
use crate::error::{HarnessError, HarnessResult};
use crate::port::PipeSource;
use crate::queue::{delivery_queue, ChunkReceiver};
use crate::reader::{spawn_reader, LoopExit, ReadMode, ReaderTask};
use memchr::memmem;
use std::io::{ErrorKind, Write};
use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Span};

/// Lifecycle of a spawned tool process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Not started yet.
    #[default]
    Created,
    Running,
    /// Exited with status 0.
    ExitedCleanly,
    /// Exited with a non-zero status.
    ExitedWithError(i32),
    /// Terminated by a signal, including our own kill.
    Killed,
}

impl ProcessState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Exit code, when the process exited on its own.
    pub const fn exit_code(self) -> Option<i32> {
        match self {
            Self::ExitedCleanly => Some(0),
            Self::ExitedWithError(code) => Some(code),
            _ => None,
        }
    }

    fn from_exit(status: &ExitStatus) -> Self {
        match status.code() {
            Some(0) => Self::ExitedCleanly,
            Some(code) => Self::ExitedWithError(code),
            None => Self::Killed,
        }
    }
}

/// A running instance of the tool with piped stdin/stdout.
///
/// No restart: once the child has exited, spawn a new `ToolProcess`.
///
/// # Example
///
/// ```no_run
/// use spcom_harness::process::{ToolCommand, ToolProcess};
/// use std::time::Duration;
///
/// let cmd = ToolCommand::new("../spcom/build/spcom").port("/dev/tnt1").baud(115200);
/// let mut proc = ToolProcess::spawn(&cmd)?;
/// proc.write("hello")?;
/// let echoed = proc.read_until(b"hello", Duration::from_secs(2));
/// proc.terminate()?;
/// # Ok::<(), spcom_harness::HarnessError>(())
/// ```
pub struct ToolProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output: ChunkReceiver,
    reader: ReaderTask,
    state: ProcessState,
    argv: Vec<String>,
    span: Span,
}

impl std::fmt::Debug for ToolProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProcess")
            .field("pid", &self.child.id())
            .field("state", &self.state)
            .field("argv", &self.argv)
            .field("stdin_open", &self.stdin.is_some())
            .finish()
    }
}

impl ToolProcess {
    /// Start the tool and a reader over its stdout.
    pub fn spawn(command: &ToolCommand) -> HarnessResult<Self> {
        let argv = command.argv();
        let program = command.program().display().to_string();
        debug!(?argv, "spawning tool");

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        cmd.stderr(match command.stderr_mode() {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Null => Stdio::null(),
        });

        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::spawn(program.clone(), e))?;
        let stdin = child.stdin.take();
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(HarnessError::Io(std::io::Error::other("child stdout was not captured")));
        };

        let span = info_span!("tool_process", pid = child.id());
        let (tx, rx) = delivery_queue();
        let source = PipeSource::new(stdout, format!("{}:stdout", program));
        let reader = match spawn_reader(source, ReadMode::Raw, tx, span.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        span.in_scope(|| info!(program = %program, "tool started"));

        Ok(Self {
            child,
            stdin,
            output: rx,
            reader,
            state: ProcessState::Running,
            argv,
            span,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Current state, polling the child without blocking.
    pub fn state(&mut self) -> ProcessState {
        self.poll_state();
        self.state
    }

    /// Write `text` followed by a newline.
    pub fn write(&mut self, text: &str) -> HarnessResult<()> {
        self.write_with(text, Some("\n"))
    }

    /// Write `text` followed by `terminator`; `None` suppresses it.
    pub fn write_with(&mut self, text: &str, terminator: Option<&str>) -> HarnessResult<()> {
        let mut data = String::with_capacity(text.len() + 2);
        data.push_str(text);
        if let Some(terminator) = terminator {
            data.push_str(terminator);
        }
        self.write_bytes(data.as_bytes())
    }

    /// Write raw bytes to the child's stdin.
    ///
    /// Fails with [`HarnessError::PipeClosed`] once stdin was closed or the
    /// child has exited.
    pub fn write_bytes(&mut self, data: &[u8]) -> HarnessResult<()> {
        self.poll_state();
        if !self.state.is_running() {
            self.stdin = None;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.pipe_closed());
        };

        match stdin.write_all(data).and_then(|()| stdin.flush()) {
            Ok(()) => {
                self.span.in_scope(|| debug!(bytes = data.len(), "wrote to tool stdin"));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                self.stdin = None;
                Err(self.pipe_closed())
            }
            Err(e) => Err(HarnessError::Io(e)),
        }
    }

    /// Close stdin so the child sees end of input.
    pub fn close_stdin(&mut self) {
        if self.stdin.take().is_some() {
            self.span.in_scope(|| debug!("closed tool stdin"));
        }
    }

    /// Every byte of output queued so far, in the order the child wrote it.
    ///
    /// Never waits; an empty result only means nothing is queued right now.
    pub fn drain_all(&mut self) -> Vec<u8> {
        self.output.drain_all()
    }

    /// Collect output until `pattern` appears, the output ends, or `timeout`
    /// elapses. Returns everything collected, matched or not.
    pub fn read_until(&mut self, pattern: &[u8], timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        let mut collected = self.output.drain_all();

        while memmem::find(&collected, pattern).is_none() && !self.output.is_finished() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(chunk) = self.output.recv_timeout(remaining) {
                collected.extend_from_slice(&chunk);
            }
        }
        collected
    }

    /// Whether the child's stdout has reached end-of-stream.
    pub fn output_finished(&self) -> bool {
        self.output.is_finished()
    }

    pub fn try_wait(&mut self) -> HarnessResult<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if let Some(status) = &status {
            self.state = ProcessState::from_exit(status);
        }
        Ok(status)
    }

    /// Wait for the child to exit on its own, up to `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> HarnessResult<ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::Timeout(format!("pid {} to exit", self.child.id())));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Kill the child. Idempotent.
    pub fn kill(&mut self) -> HarnessResult<()> {
        self.poll_state();
        if !self.state.is_running() {
            return Ok(());
        }

        self.span.in_scope(|| info!("killing tool"));
        match self.child.kill() {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(e) => return Err(HarnessError::Io(e)),
        }
        let status = self.child.wait()?;
        self.state = ProcessState::from_exit(&status);
        Ok(())
    }

    /// Close stdin, kill the child if still running and join the reader.
    pub fn terminate(&mut self) -> HarnessResult<LoopExit> {
        self.close_stdin();
        self.kill()?;
        let exit = self.reader.join()?;
        self.span.in_scope(|| debug!(?exit, state = ?self.state, "tool terminated"));
        Ok(exit)
    }

    fn poll_state(&mut self) {
        if !self.state.is_running() {
            return;
        }
        if let Err(e) = self.try_wait() {
            self.span.in_scope(|| warn!(error = %e, "failed to poll tool state"));
        }
    }

    fn pipe_closed(&self) -> HarnessError {
        HarnessError::PipeClosed(self.argv.first().cloned().unwrap_or_default())
    }
}

impl Drop for ToolProcess {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

//! Echo bridge: emulates the remote serial device.
//!
//! Everything the bridge reads is written straight back to the same port. With
//! a spam interval configured it also writes an unsolicited `spam N` line after
//! every read attempt, so the tool under test sees inbound traffic it did not
//! ask for. All writes happen on the reader thread, after the read that caused
//! them.

use crate::error::HarnessResult;
use crate::port::{CloseHandle, PortConfiguration, PortError, SerialSource, StreamSource};
use crate::queue::{delivery_queue, ChunkReceiver, ChunkSender};
use crate::reader::{spawn_reader, ChunkSink, LoopExit, ReadMode, ReaderTask};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span};

/// Behaviour of an [`EchoBridge`].
#[derive(Debug, Clone, Default)]
pub struct BridgeOptions {
    /// Raw reads or line-buffered reads.
    pub read_mode: ReadMode,
    /// Emit `spam N\n` after every read attempt. When opening a device this
    /// also becomes the read timeout, so an idle port spams once per interval.
    pub spam_interval: Option<Duration>,
    /// Publish received chunks to a queue readable through
    /// [`EchoBridge::read`] and [`EchoBridge::drain_all`].
    pub tap: bool,
}

impl BridgeOptions {
    pub fn line_buffered(mut self) -> Self {
        self.read_mode = ReadMode::Line;
        self
    }

    pub fn with_spam(mut self, interval: Duration) -> Self {
        self.spam_interval = Some(interval);
        self
    }

    pub fn with_tap(mut self) -> Self {
        self.tap = true;
        self
    }

    /// Port settings for opening a device at `baud_rate`.
    ///
    /// The spam interval, when set, replaces `timeout` as the read timeout.
    pub fn port_configuration(&self, baud_rate: u32, timeout: Duration) -> PortConfiguration {
        PortConfiguration::new(baud_rate, self.spam_interval.unwrap_or(timeout))
    }
}

/// Format the `n`th spam message.
pub fn spam_message(n: u64) -> String {
    format!("spam {}\n", n)
}

/// Sink that echoes chunks back into the source they came from.
struct EchoSink {
    spam: bool,
    spam_sent: Arc<AtomicU64>,
    tap: Option<ChunkSender>,
}

impl<S: StreamSource + ?Sized> ChunkSink<S> for EchoSink {
    fn on_chunk(&mut self, source: &mut S, chunk: Vec<u8>) -> Result<(), PortError> {
        debug!("TX: {:?}", String::from_utf8_lossy(&chunk));
        source.write_bytes(&chunk)?;
        if let Some(tap) = &self.tap {
            // A dropped tap receiver must not stop the echo.
            tap.send(chunk);
        }
        Ok(())
    }

    fn on_cycle(&mut self, source: &mut S) -> Result<(), PortError> {
        if !self.spam {
            return Ok(());
        }
        let n = self.spam_sent.load(Ordering::Acquire);
        let message = spam_message(n);
        debug!("TX: {:?}", message);
        source.write_bytes(message.as_bytes())?;
        self.spam_sent.store(n + 1, Ordering::Release);
        Ok(())
    }
}

/// A running device emulator bound to one stream source.
#[derive(Debug)]
pub struct EchoBridge {
    port_name: String,
    closer: CloseHandle,
    reader: ReaderTask,
    tap: Option<ChunkReceiver>,
    spam_sent: Arc<AtomicU64>,
}

impl EchoBridge {
    /// Open `port` at `baud_rate` and start echoing.
    pub fn connect(port: &str, baud_rate: u32, options: BridgeOptions) -> HarnessResult<Self> {
        let config = options.port_configuration(baud_rate, PortConfiguration::default().timeout);
        Self::connect_with(port, &config, options)
    }

    /// Open `port` with an explicit configuration and start echoing.
    pub fn connect_with(
        port: &str,
        config: &PortConfiguration,
        options: BridgeOptions,
    ) -> HarnessResult<Self> {
        info!(port, baud_rate = config.baud_rate, "opening device port");
        let source = SerialSource::open(port, config)?;
        Self::attach(source, options)
    }

    /// Start echoing on an already open source.
    ///
    /// The source's own read timeout paces the spam messages.
    pub fn attach<S>(source: S, options: BridgeOptions) -> HarnessResult<Self>
    where
        S: StreamSource + 'static,
    {
        let port_name = source.name().to_string();
        let closer = source.close_handle();
        let spam_sent = Arc::new(AtomicU64::new(0));

        let (tap_tx, tap_rx) = if options.tap {
            let (tx, rx) = delivery_queue();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let sink = EchoSink {
            spam: options.spam_interval.is_some(),
            spam_sent: Arc::clone(&spam_sent),
            tap: tap_tx,
        };

        let span = info_span!("echo_bridge", port = %port_name);
        let reader = spawn_reader(source, options.read_mode, sink, span)?;
        info!(port = %port_name, mode = ?options.read_mode, "echo bridge connected");

        Ok(Self {
            port_name,
            closer,
            reader,
            tap: tap_rx,
            spam_sent,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Whether the source is open and the reader is still running.
    pub fn is_connected(&self) -> bool {
        self.closer.is_open() && !self.reader.is_finished()
    }

    /// Number of spam messages written so far.
    pub fn spam_sent(&self) -> u64 {
        self.spam_sent.load(Ordering::Acquire)
    }

    /// Close the source. The reader notices within one read timeout.
    ///
    /// Idempotent and non-blocking.
    pub fn disconnect(&mut self) {
        if self.closer.close() {
            info!(port = %self.port_name, "closing serial port");
        }
    }

    /// Wait for the reader thread to finish. Call after [`disconnect`](Self::disconnect).
    pub fn join(&mut self) -> HarnessResult<LoopExit> {
        self.reader.join()
    }

    /// Disconnect and wait up to `timeout` for the reader to exit.
    pub fn shutdown(mut self, timeout: Duration) -> HarnessResult<LoopExit> {
        self.disconnect();
        self.reader.join_timeout(timeout)
    }

    /// Wait up to `timeout` for the next chunk the peer sent.
    ///
    /// Always `None` unless the bridge was started with a tap.
    pub fn read(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        self.tap.as_mut()?.recv_timeout(timeout)
    }

    /// Everything the peer sent since the last read, without waiting.
    pub fn drain_all(&mut self) -> Vec<u8> {
        self.tap.as_mut().map(ChunkReceiver::drain_all).unwrap_or_default()
    }
}

impl Drop for EchoBridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}

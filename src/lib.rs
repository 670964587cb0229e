//! spcom Harness Library
//!
//! This library provides the building blocks for testing the `spcom` serial
//! terminal against a virtual serial port pair: an echo bridge that plays the
//! remote device, a process harness that drives the tool interactively, and a
//! runner that judges one-shot invocations by exit code.
//!
//! # Modules
//!
//! - `port`: Stream source abstraction over serial ports, pipes and mocks
//! - `reader`: Framed reader loop and background reader tasks
//! - `queue`: Single-producer delivery queue between a reader and its owner
//! - `bridge`: Echo bridge emulating the remote device
//! - `process`: Interactive and one-shot control of the tool under test
//! - `scenario`: Expectation tables and check reports
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup
//! - `error`: Unified error handling

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod process;
pub mod queue;
pub mod reader;
pub mod scenario;

// Re-export commonly used types for convenience
pub use bridge::{spam_message, BridgeOptions, EchoBridge};
pub use error::{HarnessError, HarnessResult};
pub use port::{
    CloseHandle, MockSerialPort, PipeSource, PortConfiguration, PortError, ReadOutcome,
    SerialSource, StreamSource,
};
pub use process::{
    CommandResult, CommandRunner, Expectation, ExpectationFailure, ProcessState, ToolCommand,
    ToolProcess,
};
pub use queue::{delivery_queue, ChunkReceiver, ChunkSender};
pub use reader::{spawn_reader, ChunkSink, LoopExit, ReadMode, ReaderTask};
pub use scenario::{
    loopback_probe, run_checks, CheckOutcome, CommandCheck, ExpectationTable, ScenarioReport,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

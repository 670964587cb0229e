//! Shared test utilities for spcom harness integration tests.
//!
//! This module provides:
//! - The path of the `spcom-stub` binary built alongside the tests
//! - Command builders pointed at the stub
//! - Mock port pairs wired like a tty0tty null modem

#![allow(dead_code)]

use spcom_harness::port::MockSerialPort;
use spcom_harness::process::{StderrMode, ToolCommand};
use spcom_harness::CommandRunner;
use std::path::PathBuf;
use std::time::Duration;

/// Read timeout used for mock ends; short so close is observed quickly.
pub const TICK: Duration = Duration::from_millis(20);

/// Generous upper bound for anything crossing a thread.
pub const WAIT: Duration = Duration::from_secs(3);

/// Path to the stand-in tool.
pub fn stub_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_spcom-stub"))
}

/// Interactive command for the stub, logging into `dir`.
pub fn stub_command(dir: &tempfile::TempDir) -> ToolCommand {
    ToolCommand::new(stub_path())
        .logfile(dir.path().join("spcom.log"))
        .port("/dev/tnt1")
        .baud(115_200)
        .stderr(StderrMode::Null)
}

pub fn stub_runner() -> CommandRunner {
    CommandRunner::new(stub_path())
}

/// Device and client ends with a short read timeout on both.
pub fn mock_pair() -> (MockSerialPort, MockSerialPort) {
    let (device, client) = MockSerialPort::pair("/dev/tnt0", "/dev/tnt1");
    (device.with_timeout(TICK), client.with_timeout(TICK))
}

/// Split `bytes` into lines, keeping terminators off.
pub fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

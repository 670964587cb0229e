//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All sections have defaults, so an empty file is a valid configuration.

use crate::bridge::BridgeOptions;
use crate::process::{default_logfile, Expectation, StderrMode, ToolCommand};
use crate::reader::ReadMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tool under test
    pub tool: ToolConfig,
    /// Serial defaults shared by the bridge and the client
    pub serial: SerialConfig,
    /// Device emulator
    pub echo: EchoConfig,
    /// Port handed to the tool under test
    pub client: ClientConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// One-shot expectation table
    pub checks: Vec<CheckConfig>,
}

impl Config {
    /// The `[[checks]]` table, or the built-in one when none is configured.
    pub fn expectation_table(&self) -> crate::scenario::ExpectationTable {
        if self.checks.is_empty() {
            crate::scenario::ExpectationTable::default_checks()
        } else {
            self.checks.iter().cloned().map(Into::into).collect()
        }
    }
}

/// Tool under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Path to the spcom executable
    pub path: PathBuf,
    /// Value passed with `--logfile`
    pub logfile: PathBuf,
    /// Where the tool's stderr goes when driven interactively
    pub stderr: StderrMode,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("../spcom/build/spcom"),
            logfile: default_logfile(),
            stderr: StderrMode::Inherit,
        }
    }
}

impl ToolConfig {
    /// Base interactive command, before port and baud are applied.
    pub fn command(&self) -> ToolCommand {
        ToolCommand::new(&self.path)
            .logfile(&self.logfile)
            .stderr(self.stderr)
    }
}

/// Serial port defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate for both ends
    pub baud: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud: 115_200,
            timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Device emulator section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Device-side end of the virtual pair
    pub port: String,
    /// Read whole lines instead of raw chunks
    pub line_buffered: bool,
    /// Send `spam N` after each read attempt at this interval
    pub spam_interval_ms: Option<u64>,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            port: "/dev/tnt0".to_string(),
            line_buffered: false,
            spam_interval_ms: None,
        }
    }
}

impl EchoConfig {
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            read_mode: if self.line_buffered {
                ReadMode::Line
            } else {
                ReadMode::Raw
            },
            spam_interval: self.spam_interval_ms.map(Duration::from_millis),
            ..BridgeOptions::default()
        }
    }
}

/// Client section: the end the tool under test opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub port: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: "/dev/tnt1".to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// One `[[checks]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub expect: Expectation,
}

//! Configuration module for spcom-harness.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SPCOM_HARNESS_CONFIG` environment variable (explicit path)
//! 2. `./spcom-harness.toml` (current directory)
//! 3. `config.toml` in the platform config directory (`~/.config/spcom-harness/` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SPCOM_HARNESS_<SECTION>_<KEY>`, for example
//! `SPCOM_HARNESS_ECHO_PORT=/dev/tnt2`. `SPCOM_EXE_PATH` is accepted as a
//! short form of `SPCOM_HARNESS_TOOL_PATH`.
//!
//! # Example
//!
//! ```toml
//! [tool]
//! path = "../spcom/build/spcom"
//!
//! [echo]
//! port = "/dev/tnt0"
//! spam_interval_ms = 3000
//!
//! [[checks]]
//! name = "help"
//! args = ["--help"]
//! expect = "success"
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    CheckConfig, ClientConfig, Config, EchoConfig, LogFormat, LoggingConfig, SerialConfig,
    ToolConfig,
};

//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SPCOM_HARNESS";

/// Config file name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "spcom-harness.toml";

/// Config file name inside the platform config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SPCOM_HARNESS_CONFIG";

/// Short alias for the tool path
const TOOL_PATH_ENV: &str = "SPCOM_EXE_PATH";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SPCOM_HARNESS_CONFIG` environment variable (explicit path)
    /// 2. `./spcom-harness.toml` (current directory)
    /// 3. `config.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match &config_path {
            Some(path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        validate(&config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this tool, e.g. `~/.config/spcom-harness`.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "spcom-harness").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var(key: &str) -> Option<(String, String)> {
    let name = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&name).ok().map(|value| (name, value))
}

fn parse_env<T: std::str::FromStr>(
    name: &str,
    value: &str,
    expected: &'static str,
) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::Env {
        var: name.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SPCOM_HARNESS_<SECTION>_<KEY>`
/// For example:
/// - `SPCOM_HARNESS_SERIAL_BAUD=9600`
/// - `SPCOM_HARNESS_ECHO_PORT=/dev/tnt2`
/// - `SPCOM_HARNESS_ECHO_SPAM_INTERVAL_MS=3000`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Tool overrides (also support the short SPCOM_EXE_PATH)
    if let Some((_, val)) = env_var("TOOL_PATH").or_else(|| {
        std::env::var(TOOL_PATH_ENV)
            .ok()
            .map(|v| (TOOL_PATH_ENV.to_string(), v))
    }) {
        config.tool.path = PathBuf::from(val);
    }
    if let Some((_, val)) = env_var("TOOL_LOGFILE") {
        config.tool.logfile = PathBuf::from(val);
    }

    // Serial overrides
    if let Some((name, val)) = env_var("SERIAL_BAUD") {
        config.serial.baud = parse_env(&name, &val, "baud rate")?;
    }
    if let Some((name, val)) = env_var("SERIAL_TIMEOUT_MS") {
        config.serial.timeout_ms = parse_env(&name, &val, "timeout")?;
    }

    // Echo bridge overrides
    if let Some((_, val)) = env_var("ECHO_PORT") {
        config.echo.port = val;
    }
    if let Some((_, val)) = env_var("ECHO_LINE_BUFFERED") {
        config.echo.line_buffered = parse_bool(&val);
    }
    if let Some((name, val)) = env_var("ECHO_SPAM_INTERVAL_MS") {
        config.echo.spam_interval_ms = Some(parse_env(&name, &val, "spam interval")?);
    }

    if let Some((_, val)) = env_var("CLIENT_PORT") {
        config.client.port = val;
    }

    if let Some((_, val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }

    Ok(())
}

fn validate(config: &Config) -> ConfigResult<()> {
    if config.serial.baud == 0 {
        return Err(ConfigError::invalid("serial.baud", "must be non-zero"));
    }
    if config.serial.timeout_ms == 0 {
        return Err(ConfigError::invalid("serial.timeout_ms", "must be non-zero"));
    }
    if config.tool.path.as_os_str().is_empty() {
        return Err(ConfigError::invalid("tool.path", "must not be empty"));
    }
    if config.echo.spam_interval_ms == Some(0) {
        return Err(ConfigError::invalid(
            "echo.spam_interval_ms",
            "must be non-zero when set",
        ));
    }
    Ok(())
}

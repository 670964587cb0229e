//! Configuration error types for the config module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, reading or checking the harness config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("Config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value parsed but is unusable, e.g. a zero baud rate
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },

    /// An override variable could not be parsed
    #[error("{var}={value:?} is not a valid {expected}")]
    Env {
        var: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_error_names_variable_and_value() {
        let err = ConfigError::Env {
            var: "SPCOM_HARNESS_SERIAL_BAUD".into(),
            value: "fast".into(),
            expected: "baud rate",
        };
        assert_eq!(
            err.to_string(),
            r#"SPCOM_HARNESS_SERIAL_BAUD="fast" is not a valid baud rate"#
        );
    }
}

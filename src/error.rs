use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Unified harness error type.
///
/// Background reader failures never show up here: they end the reader task
/// and are observed by the owner as a closed source or a finished queue.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Opening or using a stream source failed.
    #[error("Stream source error: {0}")]
    Port(#[from] PortError),

    /// The tool under test could not be started.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the child's stdin after it was closed or the child exited.
    #[error("Input pipe of '{0}' is closed")]
    PipeClosed(String),

    /// A reader thread panicked instead of returning.
    #[error("Reader task '{0}' panicked")]
    ReaderPanicked(String),

    /// Waiting for a reader or child exceeded its deadline.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HarnessError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_program() {
        let err = HarnessError::spawn(
            "../spcom/build/spcom",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to spawn '../spcom/build/spcom'"), "{msg}");
    }

    #[test]
    fn test_port_error_converts() {
        let err: HarnessError = PortError::not_open("tnt0").into();
        assert!(matches!(err, HarnessError::Port(PortError::NotOpen(_))));
    }
}

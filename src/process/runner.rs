//! One-shot invocations of the tool under test.
//!
//! The runner blocks until the child exits and judges the run only by its
//! exit code against a declared [`Expectation`]. A mismatch is a value, not an
//! error, so a batch of checks keeps going after one of them fails.

use super::command::{build_command, one_shot_argv};
use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Outcome of one completed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Full argument vector, program first.
    pub args: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Declared polarity of a one-shot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    /// Exit code must be 0.
    Success,
    /// Exit code must be non-zero (or the child died from a signal).
    Failure,
}

impl Expectation {
    pub fn from_success(expect_success: bool) -> Self {
        if expect_success {
            Self::Success
        } else {
            Self::Failure
        }
    }

    pub fn is_met_by(self, result: &CommandResult) -> bool {
        match self {
            Self::Success => result.success(),
            Self::Failure => !result.success(),
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "zero"),
            Self::Failure => write!(f, "non-zero"),
        }
    }
}

/// A run whose exit code disagreed with its expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationFailure {
    pub expected: Expectation,
    pub exit_code: Option<i32>,
    pub args: Vec<String>,
}

impl fmt::Display for ExpectationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit_code {} expected {} - {:?}", code, self.expected, self.args),
            None => write!(f, "exit_code <signal> expected {} - {:?}", self.expected, self.args),
        }
    }
}

impl std::error::Error for ExpectationFailure {}

/// Runs the tool to completion, one invocation at a time.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run `program args...` with stdin closed and both output streams captured.
    pub fn run<S: AsRef<str>>(&self, args: &[S]) -> HarnessResult<CommandResult> {
        let argv = one_shot_argv(&self.program, args);
        debug!(?argv, "running tool");

        let output = build_command(&self.program, args.iter().map(|a| a.as_ref().to_string()))
            .output()
            .map_err(|e| HarnessError::spawn(self.program.display().to_string(), e))?;

        Ok(CommandResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            args: argv,
        })
    }

    /// Run and compare the exit code with `expect`.
    ///
    /// Returns `Ok(Some(failure))` on a mismatch, which is also logged.
    /// `Err` is reserved for runs that could not be started at all.
    pub fn test_command<S: AsRef<str>>(
        &self,
        expect: Expectation,
        args: &[S],
    ) -> HarnessResult<Option<ExpectationFailure>> {
        let result = self.run(args)?;
        Ok(check_result(expect, &result))
    }

    /// [`test_command`](Self::test_command) with a boolean polarity.
    pub fn test_command_bool<S: AsRef<str>>(
        &self,
        expect_success: bool,
        args: &[S],
    ) -> HarnessResult<Option<ExpectationFailure>> {
        self.test_command(Expectation::from_success(expect_success), args)
    }
}

/// Compare a finished run with its expectation.
pub fn check_result(expect: Expectation, result: &CommandResult) -> Option<ExpectationFailure> {
    if expect.is_met_by(result) {
        return None;
    }
    let failure = ExpectationFailure {
        expected: expect,
        exit_code: result.exit_code,
        args: result.args.clone(),
    };
    error!("{}", failure);
    Some(failure)
}

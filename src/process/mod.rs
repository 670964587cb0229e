//! Driving the tool under test as a child process.
//!
//! - `command`: argument vector construction
//! - `harness`: interactive process with piped stdin/stdout
//! - `runner`: one-shot invocations judged by exit code

pub mod command;
pub mod harness;
pub mod runner;

pub use command::{default_logfile, one_shot_argv, StderrMode, ToolCommand};
pub use harness::{ProcessState, ToolProcess};
pub use runner::{check_result, CommandResult, CommandRunner, Expectation, ExpectationFailure};

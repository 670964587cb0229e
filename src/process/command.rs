//! Argument vector construction for the tool under test.
//!
//! Arguments are kept as discrete elements and never joined into a shell
//! string.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// How the child's stderr is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Share the harness's stderr.
    #[default]
    Inherit,
    /// Discard.
    Null,
}

/// An interactive invocation of the tool, built up flag by flag.
///
/// # Example
///
/// ```rust
/// use spcom_harness::process::ToolCommand;
///
/// let cmd = ToolCommand::new("../spcom/build/spcom")
///     .logfile("/tmp/spcom.log")
///     .port("/dev/tnt1")
///     .baud(115200)
///     .arg("--verbose");
///
/// assert_eq!(
///     cmd.argv(),
///     vec!["../spcom/build/spcom", "--logfile", "/tmp/spcom.log",
///          "--port", "/dev/tnt1", "--baud", "115200", "--verbose"],
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    logfile: PathBuf,
    port: Option<String>,
    baud: Option<u32>,
    extra: Vec<String>,
    stderr: StderrMode,
}

impl ToolCommand {
    /// Start a command for `program`, logging to `<tmp>/spcom.log`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            logfile: default_logfile(),
            port: None,
            baud: None,
            extra: Vec::new(),
            stderr: StderrMode::default(),
        }
    }

    #[must_use]
    pub fn logfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.logfile = path.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    #[must_use]
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }

    /// Append one extra argument after the fixed flags.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra.push(arg.into());
        self
    }

    /// Append extra arguments after the fixed flags, in order.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn stderr_mode(&self) -> StderrMode {
        self.stderr
    }

    /// The full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            self.program.display().to_string(),
            "--logfile".to_string(),
            self.logfile.display().to_string(),
        ];
        if let Some(port) = &self.port {
            argv.push("--port".to_string());
            argv.push(port.clone());
        }
        if let Some(baud) = self.baud {
            argv.push("--baud".to_string());
            argv.push(baud.to_string());
        }
        argv.extend(self.extra.iter().cloned());
        argv
    }

    /// Build a `std::process::Command` without any stdio wiring.
    pub fn to_command(&self) -> Command {
        build_command(&self.program, self.argv().into_iter().skip(1))
    }
}

/// The argument vector of a one-shot invocation: program followed by `args`.
pub fn one_shot_argv<S: AsRef<str>>(program: &Path, args: &[S]) -> Vec<String> {
    std::iter::once(program.display().to_string())
        .chain(args.iter().map(|a| a.as_ref().to_string()))
        .collect()
}

pub(crate) fn build_command<I, S>(program: &Path, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut command = Command::new(program);
    command.args(args.into_iter().map(Into::into));
    command
}

/// `<tmp>/spcom.log`.
pub fn default_logfile() -> PathBuf {
    std::env::temp_dir().join("spcom.log")
}

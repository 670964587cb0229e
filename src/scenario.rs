//! Named expectation tables and the batch runner behind `spcom-harness check`.
//!
//! Each [`CommandCheck`] pins the exit-code polarity of one invocation. The
//! built-in table records the tool's conventions as they are, so a reader can
//! audit them in one place instead of inferring them from test code.

use crate::config::CheckConfig;
use crate::error::HarnessResult;
use crate::port::{ReadOutcome, StreamSource};
use crate::process::{CommandRunner, Expectation, ExpectationFailure};
use crate::reader::READ_BUFFER_SIZE;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// One one-shot invocation and the exit code polarity it must have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCheck {
    pub name: String,
    pub args: Vec<String>,
    pub expect: Expectation,
}

impl CommandCheck {
    pub fn new<I, S>(name: impl Into<String>, args: I, expect: Expectation) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            expect,
        }
    }
}

impl From<CheckConfig> for CommandCheck {
    fn from(check: CheckConfig) -> Self {
        Self {
            name: check.name,
            args: check.args,
            expect: check.expect,
        }
    }
}

/// Ordered list of checks, run top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationTable {
    checks: Vec<CommandCheck>,
}

impl ExpectationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The tool's exit code conventions.
    ///
    /// An unknown flag must be rejected and `--help` must succeed. Replace the
    /// table from `[[checks]]` when testing a build with other conventions.
    pub fn default_checks() -> Self {
        [
            CommandCheck::new(
                "unknown-flag",
                ["--this-argument-should-not-exist"],
                Expectation::Failure,
            ),
            CommandCheck::new("help", ["--help"], Expectation::Success),
            CommandCheck::new("version", ["--version"], Expectation::Success),
            CommandCheck::new("list-ports", ["--list"], Expectation::Success),
        ]
        .into_iter()
        .collect()
    }

    pub fn push(&mut self, check: CommandCheck) {
        self.checks.push(check);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommandCheck> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl FromIterator<CommandCheck> for ExpectationTable {
    fn from_iter<T: IntoIterator<Item = CommandCheck>>(iter: T) -> Self {
        Self {
            checks: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ExpectationTable {
    type Item = &'a CommandCheck;
    type IntoIter = std::slice::Iter<'a, CommandCheck>;

    fn into_iter(self) -> Self::IntoIter {
        self.checks.iter()
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub name: String,
    pub args: Vec<String>,
    pub expect: Expectation,
    /// `None` for a signal death or a run that never started.
    pub exit_code: Option<i32>,
    /// Failure message, `None` when the check passed.
    pub failure: Option<String>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcomes of a whole table, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<CheckOutcome>,
}

impl ScenarioReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(CheckOutcome::passed)
    }
}

/// Run every check in `table`, continuing past failures.
///
/// A check whose program could not be started is recorded as a failure.
pub fn run_checks(runner: &CommandRunner, table: &ExpectationTable) -> ScenarioReport {
    let span = info_span!("checks", program = %runner.program().display());
    let _enter = span.enter();

    let mut report = ScenarioReport::default();
    for check in table {
        let outcome = match runner.run(&check.args) {
            Ok(result) => {
                let failure = crate::process::check_result(check.expect, &result);
                CheckOutcome {
                    name: check.name.clone(),
                    args: result.args,
                    expect: check.expect,
                    exit_code: result.exit_code,
                    failure: failure.as_ref().map(ExpectationFailure::to_string),
                }
            }
            Err(e) => {
                error!(check = %check.name, "could not run: {}", e);
                CheckOutcome {
                    name: check.name.clone(),
                    args: check.args.clone(),
                    expect: check.expect,
                    exit_code: None,
                    failure: Some(e.to_string()),
                }
            }
        };
        if outcome.passed() {
            info!(check = %outcome.name, "passed");
        }
        report.outcomes.push(outcome);
    }

    info!(
        passed = report.passed(),
        total = report.outcomes.len(),
        "checks finished"
    );
    report
}

/// Write `payload` from the peer end of an echo bridge and collect what comes
/// back until the payload has been seen or `timeout` elapses.
///
/// The returned bytes may contain spam lines around the echo. A source that
/// reaches end of stream ends the probe early.
pub fn loopback_probe<S>(peer: &mut S, payload: &[u8], timeout: Duration) -> HarnessResult<Vec<u8>>
where
    S: StreamSource + ?Sized,
{
    peer.write_bytes(payload)?;

    let deadline = Instant::now() + timeout;
    let mut received = Vec::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    while Instant::now() < deadline {
        match peer.read_chunk(&mut buffer)? {
            ReadOutcome::Data(n) => {
                received.extend_from_slice(&buffer[..n]);
                if memmem::find(&received, payload).is_some() {
                    return Ok(received);
                }
            }
            ReadOutcome::TimedOut => {}
            ReadOutcome::Eof => break,
        }
    }

    warn!(
        port = peer.name(),
        received = received.len(),
        "echo not seen before timeout"
    );
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeOptions, EchoBridge};
    use crate::port::MockSerialPort;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_table_order_and_polarity() {
        let table = ExpectationTable::default_checks();
        let names: Vec<_> = table.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["unknown-flag", "help", "version", "list-ports"]);

        let first = table.iter().next().unwrap();
        assert_eq!(first.args, vec!["--this-argument-should-not-exist"]);
        assert_eq!(first.expect, Expectation::Failure);
    }

    #[test]
    fn test_table_from_config_entries() {
        let entries = vec![CheckConfig {
            name: "baud".into(),
            args: vec!["--baud".into(), "0".into()],
            expect: Expectation::Failure,
        }];
        let table: ExpectationTable = entries.into_iter().map(CommandCheck::from).collect();
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().next().unwrap().args, vec!["--baud", "0"]);
    }

    #[test]
    fn test_missing_program_is_recorded_not_raised() {
        let runner = CommandRunner::new("/nonexistent/spcom-12345");
        let report = run_checks(&runner, &ExpectationTable::default_checks());

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.passed(), 0);
        assert_eq!(report.failures().count(), 4);
        assert!(!report.is_success());
    }

    #[test]
    fn test_report_serializes() {
        let report = ScenarioReport {
            outcomes: vec![CheckOutcome {
                name: "help".into(),
                args: vec!["spcom".into(), "--help".into()],
                expect: Expectation::Success,
                exit_code: Some(0),
                failure: None,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["expect"], "success");
        assert!(report.is_success());
    }

    #[test]
    fn test_empty_report_is_success() {
        assert!(ScenarioReport::default().is_success());
    }

    #[test]
    fn test_loopback_probe_sees_echo() {
        let (device, client) = MockSerialPort::pair("tnt0", "tnt1");
        let bridge = EchoBridge::attach(
            device.with_timeout(Duration::from_millis(20)),
            BridgeOptions::default(),
        )
        .unwrap();

        let mut peer = client.with_timeout(Duration::from_millis(20));
        let echoed = loopback_probe(&mut peer, b"ping\n", Duration::from_secs(2)).unwrap();
        assert_eq!(echoed, b"ping\n".to_vec());

        bridge.shutdown(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_loopback_probe_times_out_without_bridge() {
        let (_device, client) = MockSerialPort::pair("tnt0", "tnt1");
        let mut peer = client.with_timeout(Duration::from_millis(10));
        let echoed = loopback_probe(&mut peer, b"ping\n", Duration::from_millis(50)).unwrap();
        assert!(echoed.is_empty());
    }
}

//! One-shot runs judged by exit code, against the stand-in tool.

mod common;

use common::stub_runner;
use pretty_assertions::assert_eq;
use spcom_harness::{run_checks, CommandCheck, Expectation, ExpectationTable};

#[test]
fn run_captures_exit_code_and_streams() {
    let runner = stub_runner();

    let list = runner.run(&["--list"]).unwrap();
    assert!(list.success());
    assert!(list.stdout.contains("/dev/tnt0"), "{}", list.stdout);
    assert_eq!(list.args[1..].to_vec(), vec!["--list".to_string()]);

    let help = runner.run(&["--help"]).unwrap();
    assert_eq!(help.exit_code, Some(1));
    assert!(help.stderr.starts_with("usage:"), "{}", help.stderr);
    assert!(help.stdout.is_empty());
}

#[test]
fn unknown_flag_is_tolerated_so_expecting_failure_reports() {
    let runner = stub_runner();

    let failure = runner
        .test_command(Expectation::Failure, &["--this-argument-should-not-exist"])
        .unwrap()
        .expect("tool exits 0 on unknown flags");
    assert_eq!(failure.exit_code, Some(0));
    assert!(
        failure.to_string().starts_with("exit_code 0 expected non-zero - "),
        "{}",
        failure
    );
    assert!(failure.to_string().contains("--this-argument-should-not-exist"));

    // Stating the tool's real behaviour passes.
    assert_eq!(
        runner
            .test_command(Expectation::Success, &["--this-argument-should-not-exist"])
            .unwrap(),
        None
    );
}

#[test]
fn help_exits_non_zero_so_expecting_success_reports() {
    let runner = stub_runner();

    let failure = runner
        .test_command_bool(true, &["--help"])
        .unwrap()
        .expect("tool exits non-zero on --help");
    assert_eq!(failure.exit_code, Some(1));
    assert_eq!(failure.expected, Expectation::Success);
    assert!(failure.to_string().starts_with("exit_code 1 expected zero - "));

    assert_eq!(runner.test_command_bool(false, &["--help"]).unwrap(), None);
}

#[test]
fn default_table_keeps_going_after_failures() {
    let report = run_checks(&stub_runner(), &ExpectationTable::default_checks());

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["unknown-flag", "help", "version", "list-ports"]);

    let failed: Vec<&str> = report.failures().map(|o| o.name.as_str()).collect();
    assert_eq!(failed, ["unknown-flag", "help"]);
    assert_eq!(report.passed(), 2);
    assert!(!report.is_success());

    let help = &report.outcomes[1];
    assert_eq!(help.exit_code, Some(1));
    assert!(help.failure.as_deref().unwrap().contains("expected zero"));
}

#[test]
fn table_matching_the_tool_passes() {
    let table: ExpectationTable = [
        CommandCheck::new("unknown-flag", ["--bogus"], Expectation::Success),
        CommandCheck::new("help", ["--help"], Expectation::Failure),
        CommandCheck::new("version", ["--version"], Expectation::Success),
    ]
    .into_iter()
    .collect();

    let report = run_checks(&stub_runner(), &table);
    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.passed(), 3);

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains(r#""expect":"failure""#), "{}", json);
}

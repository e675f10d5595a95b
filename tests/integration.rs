//! End-to-end runs of the built binary with shell one-liners as tests.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Fails any test whose name contains `fail`.
const TEST_COMMAND: &[&str] = &[
    "--",
    "/bin/sh",
    "-c",
    "case \"$0\" in *fail*) echo broken >&2; exit 1;; esac",
    "{name}",
];

fn testlane(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_testlane"))
        .current_dir(dir)
        .args(args)
        .env_remove("TESTLANE_WORKERS")
        .env_remove("TESTLANE_FORMAT")
        .env_remove("TESTLANE_STOP_ON_ERROR")
        .env_remove("TESTLANE_CONFIG")
        .output()
        .expect("failed to run testlane")
}

fn run_with_command(dir: &Path, args: &[&str]) -> Output {
    let mut full = vec!["run"];
    full.extend_from_slice(args);
    full.extend_from_slice(TEST_COMMAND);
    testlane(dir, &full)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_passing_run_exits_zero() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "2", "-F", "tap", "Suite::test_a", "Suite::test_b"],
    );

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(0), "{text}");
    assert!(text.starts_with("TAP version 13\n1..2\n"));
    assert!(text.contains("ok 1 - Suite::test_a"));
    assert!(text.contains("ok 2 - Suite::test_b"));
    assert!(!text.contains("not ok"));
}

#[test]
fn test_failing_run_exits_one() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "3", "-F", "tap", "Suite::test_a", "Suite::test_fail", "Suite::test_c"],
    );

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{text}");
    assert!(text.contains("not ok 2 - Suite::test_fail"));
    assert!(text.contains("exited with status 1"));
    assert!(text.contains("ok 3 - Suite::test_c"));
}

#[test]
fn test_lane_report_summary() {
    let dir = tempdir().unwrap();
    let output = run_with_command(dir.path(), &["-C", "2", "A::one", "A::two", "A::three"]);

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(0), "{text}");
    assert!(text.contains("A::three"));
    assert!(text.contains("OK Executed: 3/3"));
    assert!(!text.contains('\x1b'), "piped output must not be colored");
}

#[test]
fn test_stop_on_error() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "1", "-F", "tap", "--stop-on-error", "S::test_fail", "S::test_b", "S::test_c"],
    );

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{text}");
    assert!(text.contains("not ok 1 - S::test_fail"));
    assert!(!text.contains("S::test_b"));
    assert!(!text.contains("S::test_c"));
}

#[test]
fn test_json_writer_file() {
    let dir = tempdir().unwrap();
    let output = run_with_command(dir.path(), &["-C", "2", "-W", "json:events.json", "A::one"]);
    assert_eq!(output.status.code(), Some(0));

    let events = std::fs::read_to_string(dir.path().join("events.json")).unwrap();
    let lines: Vec<serde_json::Value> = events
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.first().unwrap()["event"], "begin");
    assert_eq!(lines.last().unwrap()["event"], "end");
    assert_eq!(lines.last().unwrap()["summary"]["executed_tests"], 1);
}

#[test]
fn test_malformed_writer_is_fatal() {
    let dir = tempdir().unwrap();
    let output = run_with_command(dir.path(), &["-W", "tap", "A::one"]);
    assert_ne!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid writer"));
}

#[test]
fn test_record_then_replay() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "1", "--record-dir", "lanes", "R::one", "R::test_fail", "R::three"],
    );
    assert_eq!(output.status.code(), Some(1));

    let log = dir.path().join("lanes").join("WorkerA.log");
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 3);

    let output = testlane(
        dir.path(),
        &["run", "-F", "tap", "--replay", "lanes/WorkerA.log"],
    );
    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{text}");
    assert!(text.contains("1..3"));
    assert!(text.contains("ok 1 - R::one"));
    assert!(text.contains("not ok 2 - R::test_fail"));
    assert!(text.contains("ok 3 - R::three"));
}

#[test]
fn test_missing_replay_file() {
    let dir = tempdir().unwrap();
    let output = testlane(dir.path(), &["run", "--replay", "missing.log"]);
    assert_ne!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.log"));
}

#[test]
fn test_config_file_command() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("testlane.yaml"),
        "workers: 2\nformatter: tap\ncommand: \"test {name} != bad\"\n",
    )
    .unwrap();

    let output = testlane(dir.path(), &["run", "C::good", "C::bad"]);
    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{text}");
    assert!(text.contains("ok 1 - C::good"));
    assert!(text.contains("not ok 2 - C::bad"));
}

#[test]
fn test_list() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("tests.yaml"), "- A::one\n- class: B\n  name: two\n").unwrap();

    let output = testlane(dir.path(), &["list", "-m", "tests.yaml"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("1  A::one"));
    assert!(text.contains("2  B::two"));
}

#[test]
fn test_xunit_writer_file() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "2", "-F", "tap", "-W", "xunit:report.xml", "X::test_a", "X::test_fail"],
    );
    assert_eq!(output.status.code(), Some(1));

    let xml = std::fs::read_to_string(dir.path().join("report.xml")).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("tests=\"2\" failures=\"1\" errors=\"0\""));
    assert!(xml.contains("<testcase classname=\"X\" name=\"test_a\""));
    assert!(xml.contains("<failure type=\"failure\""));
    assert!(xml.trim_end().ends_with("</testsuites>"));
}

#[test]
fn test_noiseless_prints_problems_only() {
    let dir = tempdir().unwrap();
    let output = run_with_command(
        dir.path(),
        &["-C", "2", "-F", "noiseless", "N::test_a", "N::test_fail", "N::test_c"],
    );

    let text = stdout(&output);
    assert_eq!(output.status.code(), Some(1), "{text}");
    assert!(text.contains("[F] N::test_fail"));
    assert!(!text.contains("N::test_a"));
    assert!(!text.contains("N::test_c"));
    assert!(text.lines().last().unwrap().starts_with("FAILED 66.7% passed"));
}

//! Integration tests for the `calendar` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to drive the real binary
//! against CSV fixtures, covering every subcommand, stdin input, timezone
//! handling, and error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

/// Helper: path to the events.csv fixture.
fn events_csv() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/events.csv")
}

/// Helper: path to the with_errors.csv fixture.
fn with_errors_csv() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/with_errors.csv")
}

/// Helper: the binary with configuration variables cleared.
fn calendar() -> Command {
    let mut cmd = Command::cargo_bin("calendar").unwrap();
    cmd.env_remove("CALENDAR_INPUT")
        .env_remove("CALENDAR_TZ")
        .env_remove("RUST_LOG");
    cmd
}

/// Helper: run with `--format json` and return the subjects of the result.
fn json_subjects(args: &[&str]) -> Vec<String> {
    let output = calendar()
        .args(["-i", events_csv(), "--format", "json"])
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "command failed: {:?}", args);
    let value: Value = serde_json::from_slice(&output.stdout).expect("stdout must be JSON");
    value
        .as_array()
        .expect("JSON output must be an array")
        .iter()
        .map(|e| e["subject"].as_str().unwrap().to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn list_is_in_start_order() {
    assert_eq!(
        json_subjects(&["list"]),
        vec!["A", "B", "E5", "E6", "E10", "Holiday"]
    );
}

#[test]
fn list_text_renders_times_and_locations() {
    calendar()
        .args(["-i", events_csv(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-01 09:00 → 2025-01-01 15:30  A @ Room 1"))
        .stdout(predicate::str::contains("2025-01-20 → 2025-01-20 (all day)  Holiday"));
}

#[test]
fn at_returns_events_in_progress() {
    assert_eq!(json_subjects(&["at", "2025-01-01T12:30"]), vec!["A", "B"]);
}

#[test]
fn at_far_future_prints_nothing_found() {
    calendar()
        .args(["-i", events_csv(), "at", "2099-01-01T00:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No events found."));
}

#[test]
fn overlapping_window_matches_reference_cases() {
    assert_eq!(
        json_subjects(&["overlapping", "2025-01-06T00:00", "2025-01-07T10:00"]),
        vec!["E5", "E6", "E10"]
    );
    assert!(json_subjects(&["overlapping", "2025-01-07T15:30", "2025-01-07T19:00"]).is_empty());
    assert_eq!(
        json_subjects(&["overlapping", "2025-01-07T15:29", "2025-01-07T19:00"]),
        vec!["E10"]
    );
}

#[test]
fn find_returns_matching_subjects_with_details() {
    let output = calendar()
        .args(["-i", events_csv(), "--format", "json", "find", "E10"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = value.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["description"], "Dentist, bring card");
    assert_eq!(events[0]["is_public"], false);
}

#[test]
fn get_exact_match_succeeds() {
    calendar()
        .args(["-i", events_csv(), "get", "E6", "2025-01-06T00:00", "2025-01-07T00:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("E6"));
}

#[test]
fn get_without_match_exits_with_failure() {
    calendar()
        .args(["-i", events_csv(), "get", "E6", "2025-01-06T00:00", "2025-01-06T19:45"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No matching event."));
}

/// Helper: `at` subjects for `instant` with the CSV loaded in `timezone`.
fn subjects_at(timezone: &str, instant: &str) -> Vec<String> {
    let output = calendar()
        .args(["-i", events_csv(), "-z", timezone, "--format", "json"])
        .args(["at", instant])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["subject"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn timezone_applies_to_csv_times_and_query_instants() {
    // A and B are read as New York wall-clock times, and so is the query.
    assert_eq!(subjects_at("America/New_York", "2025-01-01T12:30"), vec!["A", "B"]);
    // 07:30 in New York is before A starts there.
    assert!(subjects_at("America/New_York", "2025-01-01T07:30").is_empty());
}

#[test]
fn absolute_instants_ignore_the_timezone_flag() {
    // 17:30Z is 12:30 in New York.
    assert_eq!(subjects_at("America/New_York", "2025-01-01T17:30:00Z"), vec!["A", "B"]);
    assert_eq!(subjects_at("UTC", "2025-01-01T17:30:00Z"), vec!["B"]);
}

#[test]
fn timezone_can_come_from_the_environment() {
    calendar()
        .env("CALENDAR_TZ", "Asia/Tokyo")
        .args(["-i", events_csv(), "find", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-01 09:00 → 2025-01-01 15:30  A"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Import / export / stats
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn import_reports_counts() {
    calendar()
        .args(["-i", events_csv(), "import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 6/6 events"));
}

#[test]
fn import_reports_skipped_rows() {
    calendar()
        .args(["-i", with_errors_csv(), "import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2/3 events"))
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn stdin_is_read_when_no_input_is_given() {
    let csv = std::fs::read_to_string(events_csv()).unwrap();

    calendar()
        .arg("list")
        .write_stdin(csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("E10"));
}

#[test]
fn export_to_file_round_trips() {
    let output_path = std::env::temp_dir().join("calendar-cli-export-roundtrip.csv");
    let _ = std::fs::remove_file(&output_path);
    let output_str = output_path.to_str().unwrap();

    calendar()
        .args(["-i", events_csv(), "export", "-o", output_str])
        .assert()
        .success();

    let exported = std::fs::read_to_string(&output_path).expect("export file must exist");
    assert!(exported.starts_with("Subject,Start Date,Start Time"));
    assert_eq!(exported.lines().count(), 7);

    calendar()
        .args(["-i", output_str, "import"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 6/6 events"));

    let _ = std::fs::remove_file(&output_path);
}

#[test]
fn export_to_stdout_is_sorted() {
    let output = calendar()
        .args(["-i", events_csv(), "export"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let subjects: Vec<&str> = stdout
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap())
        .collect();
    assert_eq!(subjects, vec!["A", "B", "E5", "E6", "E10", "Holiday"]);
}

#[test]
fn stats_reports_index_shape() {
    calendar()
        .args(["-i", events_csv(), "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Events: 6"))
        .stdout(predicate::str::contains("Nodes:  5"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_timezone_fails() {
    calendar()
        .args(["-i", events_csv(), "-z", "Nowhere/Special", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone"));
}

#[test]
fn unparseable_instant_fails() {
    calendar()
        .args(["-i", events_csv(), "at", "tomorrow-ish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date/time"));
}

#[test]
fn missing_input_file_fails() {
    calendar()
        .args(["-i", "/nonexistent/events.csv", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn missing_subcommand_shows_usage() {
    calendar()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

//! Integration tests for the `tavor` driver binary, exercising the CLI
//! surface end to end (spec.md §6's exit-code table) rather than just the
//! library the binary wraps.

use std::fs;
use std::process::Command;

fn tavor_bin() -> &'static str {
    env!("CARGO_BIN_EXE_tavor")
}

#[test]
fn fuzz_emits_every_permutation_of_a_small_alternation() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"1\" | \"2\" | \"3\"\n").unwrap();

    let output = Command::new(tavor_bin())
        .args(["fuzz", format_path.to_str().unwrap(), "--strategy", "AllPermutations"])
        .output()
        .expect("failed to run tavor");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["1", "2", "3"]);
}

#[test]
fn fuzz_respects_a_limit_flag() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"1\" | \"2\" | \"3\"\n").unwrap();

    let output = Command::new(tavor_bin())
        .args(["fuzz", format_path.to_str().unwrap(), "--limit", "2"])
        .output()
        .expect("failed to run tavor");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2);
}

#[test]
fn graph_command_prints_the_start_token() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"a\"\n").unwrap();

    let output = Command::new(tavor_bin())
        .args(["graph", format_path.to_str().unwrap()])
        .output()
        .expect("failed to run tavor");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("START"));
}

#[test]
fn graph_dot_flag_emits_a_digraph() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"a\" \"b\"\n").unwrap();

    let output = Command::new(tavor_bin())
        .args(["graph", format_path.to_str().unwrap(), "--dot"])
        .output()
        .expect("failed to run tavor");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("digraph tavor {"));
}

#[test]
fn a_grammar_missing_start_exits_with_the_completion_code() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "A = \"a\"\n").unwrap();

    let output = Command::new(tavor_bin())
        .args(["fuzz", format_path.to_str().unwrap()])
        .output()
        .expect("failed to run tavor");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn validate_reports_a_matching_input() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"GET \" (\"1\" | \"2\")\n").unwrap();
    let input_path = dir.path().join("input.txt");
    fs::write(&input_path, "GET 1").unwrap();

    let output = Command::new(tavor_bin())
        .args(["validate", format_path.to_str().unwrap(), input_path.to_str().unwrap()])
        .output()
        .expect("failed to run tavor");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.trim(), "matches");
}

#[test]
fn validate_rejects_a_non_matching_input_with_the_invalid_input_code() {
    let dir = tempfile::tempdir().unwrap();
    let format_path = dir.path().join("format.tavor");
    fs::write(&format_path, "START = \"GET \" (\"1\" | \"2\")\n").unwrap();
    let input_path = dir.path().join("input.txt");
    fs::write(&input_path, "POST 1").unwrap();

    let output = Command::new(tavor_bin())
        .args(["validate", format_path.to_str().unwrap(), input_path.to_str().unwrap()])
        .output()
        .expect("failed to run tavor");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn list_filters_and_list_strategies_print_sorted_registries() {
    let filters = Command::new(tavor_bin())
        .arg("list-filters")
        .output()
        .expect("failed to run tavor");
    assert!(filters.status.success());
    let names = String::from_utf8(filters.stdout).unwrap();
    assert!(names.contains("dedup-constants"));
    assert!(names.contains("drop-resets"));

    let strategies = Command::new(tavor_bin())
        .arg("list-strategies")
        .output()
        .expect("failed to run tavor");
    assert!(strategies.status.success());
    let names = String::from_utf8(strategies.stdout).unwrap();
    assert!(names.contains("AllPermutations"));
    assert!(names.contains("PermuteOptionals"));
}

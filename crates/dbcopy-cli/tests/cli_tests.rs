//! CLI integration tests for dbcopy.
//!
//! These tests cover argument parsing, help output and exit codes for
//! configuration failures. None of them needs a live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the dbcopy binary.
fn cmd() -> Command {
    Command::cargo_bin("dbcopy").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--source-schema"))
        .stdout(predicate::str::contains("--dest-schema"))
        .stdout(predicate::str::contains("--exclude"))
        .stdout(predicate::str::contains("--link"))
        .stdout(predicate::str::contains("--update"));
}

#[test]
fn test_run_defaults() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--jobs"))
        .stdout(predicate::str::contains("[default: 8]"))
        .stdout(predicate::str::contains("[default: 10]"));
}

#[test]
fn test_query_subcommand_help() {
    cmd()
        .args(["query", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--timer"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbcopy"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_logging_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("--log-file"));
}

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // A missing file is an IO error, not a config error
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yml",
            "health-check",
            "--source",
            "erp",
        ])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "health-check",
            "--source",
            "erp",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "health-check",
            "--source",
            "erp",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_unknown_endpoint_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "warehouse:").unwrap();
    writeln!(file, "  driver: postgres").unwrap();
    writeln!(file, "  hostname: localhost").unwrap();
    writeln!(file, "  database: wh").unwrap();
    writeln!(file, "  username: etl").unwrap();
    writeln!(file, "  password: secret").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "query",
            "--source",
            "erp",
            "SELECT 1",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("erp"));
}

#[test]
fn test_run_without_kinds_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "warehouse:").unwrap();
    writeln!(file, "  driver: postgres").unwrap();
    writeln!(file, "  hostname: localhost").unwrap();
    writeln!(file, "  database: wh").unwrap();
    writeln!(file, "  username: etl").unwrap();
    writeln!(file, "  password: secret").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--source",
            "warehouse",
            "--dest",
            "file:",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_exclude_pattern_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "warehouse:").unwrap();
    writeln!(file, "  driver: postgres").unwrap();
    writeln!(file, "  hostname: localhost").unwrap();
    writeln!(file, "  database: wh").unwrap();
    writeln!(file, "  username: etl").unwrap();
    writeln!(file, "  password: secret").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--source",
            "warehouse",
            "--dest",
            "file:",
            "--tables",
            "--exclude",
            "(",
        ])
        .assert()
        .code(1);
}

// =============================================================================
// Argument Parsing Tests
// =============================================================================

#[test]
fn test_run_requires_source_and_dest() {
    cmd()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--source"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

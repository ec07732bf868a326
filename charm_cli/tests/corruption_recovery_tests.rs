//! Corruption recovery tests for the charm binary.
//!
//! These tests verify the system can handle:
//! - Corrupted stats, task and calendar files
//! - Calendar files that parse but are inconsistent
//! - Corrupted outbox lines
//! - Bad config files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cli(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("charm").expect("Failed to find charm binary");
    cmd.env("XDG_CONFIG_HOME", root.join("config"))
        .env_remove("RUST_LOG")
        .arg("--offline")
        .arg("--data-dir")
        .arg(data_dir(root));
    cmd
}

fn data_dir(root: &Path) -> PathBuf {
    root.join("data")
}

fn write_data_file(root: &Path, name: &str, contents: &str) {
    let path = data_dir(root).join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).expect("Failed to write data file");
}

#[test]
fn test_corrupted_stats_file() {
    let temp_dir = setup_test_dir();
    write_data_file(temp_dir.path(), "stats.json", "{ invalid json }}}}");

    cli(temp_dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 1 · First Year"));

    // The next change overwrites the bad file with a valid snapshot
    cli(temp_dir.path()).args(["xp", "120"]).assert().success();
    let contents = fs::read_to_string(data_dir(temp_dir.path()).join("stats.json")).unwrap();
    let stats: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(stats["xp"], 120);
}

#[test]
fn test_partial_stats_snapshot() {
    let temp_dir = setup_test_dir();
    // Older snapshots predate the streak fields
    write_data_file(
        temp_dir.path(),
        "stats.json",
        r#"{"endurance": 40, "focus": 12, "magic": 11, "xp": 900, "badges": []}"#,
    );

    cli(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 4 · Fourth Year"))
        .stdout(predicate::str::contains("Endurance 40  Focus 12  Magic 11"))
        .stdout(predicate::str::contains("Streak: 0 days"));
}

#[test]
fn test_stale_derived_fields_are_ignored() {
    let temp_dir = setup_test_dir();
    write_data_file(
        temp_dir.path(),
        "stats.json",
        r#"{"xp": 100, "level": 9, "xpToNextLevel": 5, "title": "Auror"}"#,
    );

    cli(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 2 · Second Year"))
        .stdout(predicate::str::contains("XP: 100 / 400"));
}

#[test]
fn test_corrupted_task_list() {
    let temp_dir = setup_test_dir();
    write_data_file(temp_dir.path(), "tasks.json", "[{\"id\": ");

    cli(temp_dir.path())
        .args(["tasks", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Write Body"));
}

#[test]
fn test_corrupted_calendar() {
    let temp_dir = setup_test_dir();
    write_data_file(temp_dir.path(), "schedule.json", "not a calendar");

    cli(temp_dir.path())
        .args(["grid", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of 168 hours used"));
}

#[test]
fn test_inconsistent_calendar_is_discarded() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .args(["grid", "place", "--day", "0", "--hour", "9", "--task", "task-1"])
        .assert()
        .success();

    // Drop the task record while leaving its slots in place
    let path = data_dir(temp_dir.path()).join("schedule.json");
    let mut grid: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    grid["tasks"] = serde_json::json!({});
    fs::write(&path, grid.to_string()).unwrap();

    cli(temp_dir.path())
        .args(["grid", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of 168 hours used"));
}

#[test]
fn test_corrupted_outbox_lines_are_skipped() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path()).args(["xp", "5"]).assert().success();

    let outbox = data_dir(temp_dir.path()).join("sync/outbox.jsonl");
    let mut file = fs::OpenOptions::new().append(true).open(&outbox).unwrap();
    writeln!(file, "{{ half a line").unwrap();
    drop(file);

    cli(temp_dir.path()).args(["xp", "5"]).assert().success();
    cli(temp_dir.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Offline: 2 updates queued"));
}

#[test]
fn test_invalid_config_is_reported() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[breakdown]\ntask_count = 0\n").unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("breakdown.task_count"));

    fs::write(&config_path, "[api\nbase_url = ").unwrap();
    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TOML error"));
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path()).args(["tasks", "list"]).assert().success();
    assert!(data_dir(temp_dir.path()).exists());
}

#![expect(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

//! End-to-end tests: the real `minty` binary against a foreground daemon.

mod common;

use std::time::Duration;

use common::{DaemonHarness, EXIT_NOT_RUNNING, eventually};
use predicates::prelude::*;

#[test]
fn status_without_daemon_exits_not_running() {
    let harness = DaemonHarness::without_daemon();
    harness
        .run(&["daemon", "status"])
        .code(EXIT_NOT_RUNNING)
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn client_command_without_daemon_is_unavailable() {
    let harness = DaemonHarness::without_daemon();
    harness
        .run(&["sessions"])
        .code(69)
        .stderr(predicate::str::contains("Daemon not running"));
}

#[test]
fn json_errors_are_structured() {
    let harness = DaemonHarness::without_daemon();
    let output = harness.run(&["--json", "sysinfo"]).code(69);
    let stderr = String::from_utf8_lossy(&output.get_output().stderr);
    let start = stderr.find('{').expect("JSON object on stderr");
    let json: serde_json::Value = serde_json::from_str(&stderr[start..]).unwrap();
    assert_eq!(json["category"], "external");
    assert!(json["suggestion"].as_str().unwrap().contains("daemon start"));
}

#[test]
fn completions_mention_binary() {
    let harness = DaemonHarness::without_daemon();
    harness
        .run(&["completions", "bash"])
        .success()
        .stdout(predicate::str::contains("minty"));
}

#[test]
fn usage_errors_exit_with_clap_status() {
    let harness = DaemonHarness::without_daemon();
    harness.run(&["resize", "t1", "wide", "24"]).failure();
}

#[test]
fn index_writes_manifest_and_dump() {
    let harness = DaemonHarness::without_daemon();
    let project = harness.temp_path().join("project");
    std::fs::create_dir_all(project.join("node_modules")).unwrap();
    std::fs::write(project.join("lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
    std::fs::write(project.join("node_modules").join("dep.js"), "x").unwrap();

    let report = harness.run_json(&["index", project.to_str().unwrap()]);
    assert_eq!(report["success"], true);
    assert_eq!(report["totalFiles"], 1);

    let dump = std::fs::read_to_string(project.join("codebase.md")).unwrap();
    assert!(dump.starts_with("# Codebase Dump"));
    assert!(dump.contains("## File: lib.rs"));
    assert!(!dump.contains("dep.js"));

    let manifest: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(project.join(".minty")).unwrap()).unwrap();
    assert_eq!(manifest["version"], "1.1.0");

    let again = harness.run_json(&["index", project.to_str().unwrap()]);
    assert_eq!(again["projectId"], manifest["projectId"]);
}

#[test]
fn index_of_missing_directory_is_usage_error() {
    let harness = DaemonHarness::without_daemon();
    let missing = harness.temp_path().join("nope");
    harness
        .run(&["index", missing.to_str().unwrap()])
        .code(64)
        .stderr(predicate::str::contains("Directory not found"));
}

#[test]
fn daemon_lifecycle_and_session_commands() {
    let mut harness = DaemonHarness::start();

    let status = harness.run_json(&["daemon", "status"]);
    assert_eq!(status["running"], true);
    assert_eq!(status["session_count"], 0);

    let home = harness.home();
    let created = harness.run_json(&["new", "--id", "work", "--cwd", home.to_str().unwrap()]);
    assert_eq!(created["success"], true);
    assert_eq!(created["session_id"], "work");
    assert_eq!(created["title"], "~");

    let sessions = harness.run_json(&["sessions"]);
    let listed = sessions["sessions"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], "work");

    harness.run(&["send", "work", "echo typed"]).success();
    harness.run(&["resize", "work", "100", "30"]).success();
    harness.run(&["signal", "work", "SIGINT"]).success();

    harness
        .run(&["send", "ghost", "ls"])
        .code(1)
        .stderr(predicate::str::contains("no active session"));

    harness.run(&["kill", "work"]).success();
    assert!(eventually(Duration::from_secs(5), || {
        harness.run_json(&["sessions"])["sessions"]
            .as_array()
            .is_some_and(|s| s.is_empty())
    }));

    harness.stop();
    assert!(!harness.socket_path().exists());
    harness.run(&["daemon", "status"]).code(EXIT_NOT_RUNNING);
}

#[test]
fn exec_tracks_directory_and_mirrors_exit_code() {
    let harness = DaemonHarness::start();
    let home = harness.home();
    harness
        .run(&["new", "--id", "ex", "--cwd", home.to_str().unwrap()])
        .success();

    harness
        .run(&["exec", "--session", "ex", "echo", "hello from exec"])
        .success()
        .stdout(predicate::str::contains("hello from exec"));

    harness.run(&["exec", "--session", "ex", "exit 7"]).code(7);

    let moved = harness.run_json(&["exec", "--session", "ex", "cd /"]);
    assert_eq!(moved["success"], true);
    assert_eq!(moved["cwd"], "/");
    harness
        .run(&["pwd", "ex"])
        .success()
        .stdout(predicate::str::diff("/\n"));

    harness
        .run(&["exec", "--session", "ex", "pwd"])
        .success()
        .stdout(predicate::str::contains("/"));

    harness
        .run(&["exec", "--session", "ex", "cd /definitely/not/here"])
        .code(1)
        .stderr(predicate::str::contains("no such file or directory"));

    let set = harness.run_json(&["pwd", "ex", "--set", "/tmp"]);
    assert_eq!(set["cwd"], "/tmp");
}

#[test]
fn host_queries() {
    let harness = DaemonHarness::start();

    let info = harness.run_json(&["sysinfo"]);
    assert!(info["platform"].is_string());
    assert_eq!(info["homeDir"], harness.home().to_str().unwrap());

    harness.run(&["commands", "--check", "sh"]).success();
    harness
        .run(&["commands", "--check", "definitely-not-a-command-xyz"])
        .code(1);

    let commands = harness.run_json(&["commands"]);
    let names: Vec<&str> = commands["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(names.contains(&"sh"));
    assert!(names.windows(2).all(|w| w[0] < w[1]));
}

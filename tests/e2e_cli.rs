//! End-to-end tests for the `app-server-bridge` binary.
//!
//! Run with: `cargo test --test e2e_cli`

#![cfg(unix)]

mod helpers;

use std::io::Write;
use std::process::{Command, Output, Stdio};

use helpers::fake_app_server::FakeAppServer;
use serde_json::{Value, json};

fn bridge_command(fake: &FakeAppServer) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_app-server-bridge"));
    // Keep any real user settings out of the way
    command
        .env("XDG_CONFIG_HOME", fake.dir())
        .env_remove("CODEX_BIN")
        .env_remove("RUST_LOG");
    command
}

fn stdout_json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("each stdout line should be JSON"))
        .collect()
}

#[test]
fn call_prints_the_result() {
    let fake = FakeAppServer::new();
    let output = bridge_command(&fake)
        .args(["call", "ping", "--params", "{}", "--codex-bin"])
        .arg(fake.path())
        .output()
        .expect("binary should run");

    assert!(output.status.success(), "{:?}", output);
    let printed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed, json!({"pong": true}));
}

#[test]
fn call_exits_non_zero_on_rejection() {
    let fake = FakeAppServer::new();
    let output = bridge_command(&fake)
        .args(["call", "fail", "--no-initialize", "--codex-bin"])
        .arg(fake.path())
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(1));
    let printed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed, json!({"code": 7, "message": "bad"}));
}

#[test]
fn codex_bin_can_come_from_the_settings_file() {
    let fake = FakeAppServer::new();
    let config = fake.dir().join("bridge.toml");
    std::fs::write(
        &config,
        format!(
            "codex_bin = {:?}\nauto_initialize = false\n\n[env]\nFAKE_VALUE = \"from-file\"\n",
            fake.path().display().to_string()
        ),
    )
    .unwrap();

    let output = bridge_command(&fake)
        .args(["call", "whereami", "--config"])
        .arg(&config)
        .output()
        .expect("binary should run");

    assert!(output.status.success(), "{:?}", output);
    let printed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["value"], "from-file");
}

#[test]
fn env_flag_overrides_the_settings_file() {
    let fake = FakeAppServer::new();
    let config = fake.dir().join("bridge.toml");
    std::fs::write(&config, "[env]\nFAKE_VALUE = \"from-file\"\n").unwrap();

    let output = bridge_command(&fake)
        .args(["call", "whereami", "--env", "FAKE_VALUE=from-flag", "--config"])
        .arg(&config)
        .arg("--codex-bin")
        .arg(fake.path())
        .output()
        .expect("binary should run");

    assert!(output.status.success(), "{:?}", output);
    let printed: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["value"], "from-flag");
}

#[test]
fn missing_executable_is_reported() {
    let fake = FakeAppServer::new();
    let output = bridge_command(&fake)
        .args(["call", "ping", "--codex-bin", "/nonexistent/codex"])
        .output()
        .expect("binary should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/nonexistent/codex"), "{}", stderr);
}

#[test]
fn repl_sends_requests_and_prints_events() {
    let fake = FakeAppServer::new();
    let mut child = bridge_command(&fake)
        .args(["repl", "--no-initialize", "--codex-bin"])
        .arg(fake.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("binary should start");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"ping {}\nnot a json {\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{:?}", output);

    let lines = stdout_json_lines(&output);
    assert_eq!(lines.first(), Some(&json!({"event": "ready"})));
    assert!(
        lines.contains(&json!({
            "event": "result",
            "method": "ping",
            "id": 1,
            "result": {"pong": true},
        })),
        "{:?}",
        lines
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid JSON"));
}

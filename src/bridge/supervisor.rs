//! Child process lifecycle: spawn, exit watching, termination.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{BridgeEvent, EventEmitter, ExitInfo};
use crate::config::BridgeOptions;
use crate::error::{BridgeError, BridgeResult};

/// Fixed first argument of every app server invocation.
pub(crate) const APP_SERVER_ARG: &str = "app-server";

/// A freshly spawned app server with its three pipes taken out.
pub(crate) struct SpawnedChild {
    pub(crate) child: Child,
    pub(crate) stdin: ChildStdin,
    pub(crate) stdout: ChildStdout,
    pub(crate) stderr: ChildStderr,
}

/// Spawn `<codex_bin> app-server` with piped stdio.
///
/// The environment is inherited and overlaid with `options.env`. The child
/// is killed if its handle is dropped without being reaped.
pub(crate) fn spawn_app_server(options: &BridgeOptions) -> BridgeResult<SpawnedChild> {
    let program = options.codex_bin.display().to_string();

    let mut command = Command::new(&options.codex_bin);
    command
        .arg(APP_SERVER_ARG)
        .envs(&options.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }

    let mut child = command
        .spawn()
        .map_err(|e| BridgeError::spawn_failure(program.clone(), e))?;

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(BridgeError::spawn_failure(
            program,
            io::Error::other("child stdio was not captured"),
        ));
    };

    log::info!(
        target: "app_server_bridge::bridge::supervisor",
        "Spawned {} {} (pid {:?})",
        program,
        APP_SERVER_ARG,
        child.id()
    );

    Ok(SpawnedChild {
        child,
        stdin,
        stdout,
        stderr,
    })
}

/// Watch the child until it exits, terminating it first if `cancel_token` fires.
///
/// Emits exactly one `exit` event, or an `error` event if the exit status
/// could not be collected.
pub(crate) fn spawn_exit_watcher(
    mut child: Child,
    cancel_token: CancellationToken,
    events: EventEmitter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = cancel_token.cancelled() => None,
        };

        let status = match exited {
            Some(status) => status,
            None => {
                terminate(&mut child);
                child.wait().await
            }
        };

        match status {
            Ok(status) => {
                let info = ExitInfo::from_status(status);
                log::info!(
                    target: "app_server_bridge::bridge::supervisor",
                    "App server exited (code {:?}, signal {:?})",
                    info.code,
                    info.signal
                );
                events.emit(BridgeEvent::Exit(info));
            }
            Err(e) => {
                log::warn!(
                    target: "app_server_bridge::bridge::supervisor",
                    "Failed to wait for app server: {}",
                    e
                );
                events.emit_error(BridgeError::Io(e));
            }
        }
    })
}

/// Ask the child to stop: SIGTERM on Unix, a hard kill elsewhere.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped
        return;
    };
    let Ok(raw_pid) = i32::try_from(pid) else {
        kill_hard(child);
        return;
    };

    match kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        Ok(()) => log::debug!(
            target: "app_server_bridge::bridge::supervisor",
            "Sent SIGTERM to pid {}",
            pid
        ),
        Err(e) => {
            log::warn!(
                target: "app_server_bridge::bridge::supervisor",
                "SIGTERM to pid {} failed: {}, killing",
                pid,
                e
            );
            kill_hard(child);
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    kill_hard(child);
}

fn kill_hard(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::warn!(
            target: "app_server_bridge::bridge::supervisor",
            "Failed to kill app server: {}",
            e
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sh_options(script: &str) -> (BridgeOptions, tempfile::TempDir) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-codex");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (BridgeOptions::new().codex_bin(path), dir)
    }

    async fn next_exit(rx: &mut tokio::sync::broadcast::Receiver<BridgeEvent>) -> ExitInfo {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("exit should be reported")
                .expect("event channel should stay open");
            if let BridgeEvent::Exit(info) = event {
                return info;
            }
        }
    }

    #[tokio::test]
    async fn spawn_failure_names_the_program() {
        let options = BridgeOptions::new().codex_bin("/nonexistent/codex-bridge-test");
        let err = spawn_app_server(&options).err().expect("spawn should fail");
        assert!(
            matches!(&err, BridgeError::SpawnFailure { program, .. } if program == "/nonexistent/codex-bridge-test"),
            "{:?}",
            err
        );
    }

    #[tokio::test]
    async fn child_receives_app_server_argument_cwd_and_env() {
        let (options, dir) = sh_options(r#"echo "$1|$(pwd)|$BRIDGE_TEST_VAR" >&2"#);
        let cwd = dir.path().canonicalize().unwrap();
        let options = options.cwd(&cwd).env("BRIDGE_TEST_VAR", "overlaid");

        use tokio::io::AsyncReadExt;

        let SpawnedChild {
            mut child,
            stderr: mut child_stderr,
            ..
        } = spawn_app_server(&options).unwrap();
        assert!(child.wait().await.unwrap().success());

        let mut stderr = String::new();
        child_stderr.read_to_string(&mut stderr).await.unwrap();
        assert_eq!(
            stderr.trim_end(),
            format!("app-server|{}|overlaid", cwd.display())
        );
    }

    #[tokio::test]
    async fn natural_exit_reports_code() {
        let (options, _dir) = sh_options("exit 3");
        let spawned = spawn_app_server(&options).unwrap();
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe();

        spawn_exit_watcher(spawned.child, CancellationToken::new(), events);

        let info = next_exit(&mut rx).await;
        assert_eq!(info.code, Some(3));
        assert_eq!(info.signal, None);
    }

    #[tokio::test]
    async fn cancel_terminates_with_sigterm() {
        let (options, _dir) = sh_options("exec sleep 30");
        let spawned = spawn_app_server(&options).unwrap();
        let events = EventEmitter::new(8);
        let mut rx = events.subscribe();
        let token = CancellationToken::new();

        spawn_exit_watcher(spawned.child, token.clone(), events);
        token.cancel();

        let info = next_exit(&mut rx).await;
        assert_eq!(info.code, None);
        assert_eq!(info.signal.as_deref(), Some("SIGTERM"));
    }
}

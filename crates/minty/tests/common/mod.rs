#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command as StdCommand;
use std::process::Stdio;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use assert_cmd::Command;
use tempfile::TempDir;

pub const EXIT_NOT_RUNNING: i32 = 3;

/// A foreground daemon with its socket, state and HOME inside one temp dir.
pub struct DaemonHarness {
    temp_dir: TempDir,
    socket_path: PathBuf,
    daemon: Option<Child>,
}

impl DaemonHarness {
    pub fn start() -> Self {
        // Unix socket paths are length-limited, so stay directly under /tmp.
        let temp_dir = TempDir::new_in("/tmp").expect("create temp dir");
        let socket_path = temp_dir.path().join("m.sock");
        std::fs::create_dir_all(temp_dir.path().join("home")).expect("create home");

        let mut harness = Self {
            temp_dir,
            socket_path,
            daemon: None,
        };
        let mut daemon = harness
            .std_command()
            .args(["daemon", "start", "--foreground"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        wait_for_socket(&harness.socket_path, &mut daemon, Duration::from_secs(10));
        harness.daemon = Some(daemon);
        harness
    }

    /// A harness whose socket never exists.
    pub fn without_daemon() -> Self {
        let temp_dir = TempDir::new_in("/tmp").expect("create temp dir");
        let socket_path = temp_dir.path().join("none.sock");
        Self {
            temp_dir,
            socket_path,
            daemon: None,
        }
    }

    pub fn home(&self) -> PathBuf {
        self.temp_dir.path().join("home")
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    fn apply_env(&self, cmd: &mut StdCommand) {
        cmd.env("MINTY_SOCKET", &self.socket_path)
            .env("HOME", self.home())
            .env("SHELL", "/bin/sh")
            .env("MINTY_SESSION_STORE", self.temp_dir.path().join("sessions.jsonl"))
            .env("MINTY_LIBRARY_DIR", self.temp_dir.path().join("library"))
            .env("MINTY_KEEP_SESSIONS", "1")
            // Keeps a missing daemon from being auto-started behind the test's back.
            .env("MINTY_DAEMON_FOREGROUND", "1")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("MINTY_LOG");
    }

    fn std_command(&self) -> StdCommand {
        let mut cmd = StdCommand::new(assert_cmd::cargo::cargo_bin!("minty"));
        self.apply_env(&mut cmd);
        cmd
    }

    pub fn cli(&self) -> Command {
        Command::from_std(self.std_command())
    }

    pub fn run(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.cli().args(args).timeout(Duration::from_secs(30)).assert()
    }

    pub fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let mut full = vec!["--json"];
        full.extend_from_slice(args);
        let output = self.run(&full).success();
        let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
        serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON {stdout:?}: {e}"))
    }

    /// Stops the daemon through the CLI and waits for the process to exit.
    pub fn stop(&mut self) {
        let Some(mut child) = self.daemon.take() else {
            return;
        };
        let _ = self
            .std_command()
            .args(["daemon", "stop"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            thread::sleep(Duration::from_millis(50));
        }
        let _ = child.kill();
        let _ = child.wait();
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wait_for_socket(socket_path: &Path, daemon: &mut Child, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if socket_path.exists() && std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
            return;
        }
        if let Ok(Some(status)) = daemon.try_wait() {
            panic!("daemon exited early with status {status}");
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("timed out waiting for daemon socket at {}", socket_path.display());
}

/// Polls `check` until it returns true or `timeout` passes.
pub fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

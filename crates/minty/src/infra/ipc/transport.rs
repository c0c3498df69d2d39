//! Client-side connections to the daemon socket.

use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use tracing::warn;

use super::error::ClientError;
use super::socket::log_path;
use super::socket::socket_path;

pub const FOREGROUND_ENV: &str = "MINTY_DAEMON_FOREGROUND";

const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(400);
const MAX_STARTUP_POLLS: u32 = 40;

/// One newline-delimited JSON stream to the daemon.
pub struct Connection {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl Connection {
    pub fn new(stream: UnixStream) -> Result<Self, ClientError> {
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            writer: stream,
            reader,
        })
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.writer.set_write_timeout(timeout)?;
        Ok(())
    }

    pub fn send_message(&mut self, message: &str) -> Result<(), ClientError> {
        self.writer.write_all(message.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Next line without its terminator; `None` once the daemon hangs up.
    /// A timed-out read leaves any partial line buffered for the next call.
    pub fn read_message(&mut self) -> Result<Option<String>, ClientError> {
        let mut line = String::new();
        match self.reader.read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
        }
    }

    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.writer.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

pub trait IpcTransport: Send + Sync {
    fn connect(&self) -> Result<Connection, ClientError>;
    fn is_daemon_running(&self) -> bool;

    fn supports_autostart(&self) -> bool {
        false
    }

    fn start_daemon_background(&self) -> Result<(), ClientError> {
        Err(ClientError::DaemonNotRunning)
    }
}

pub fn default_transport() -> Arc<dyn IpcTransport> {
    Arc::new(UnixSocketTransport)
}

pub struct UnixSocketTransport;

impl IpcTransport for UnixSocketTransport {
    fn connect(&self) -> Result<Connection, ClientError> {
        let path = socket_path();
        if !path.exists() {
            debug!(socket = %path.display(), "Daemon socket missing");
            return Err(ClientError::DaemonNotRunning);
        }
        debug!(socket = %path.display(), "Connecting to daemon socket");
        Connection::new(UnixStream::connect(&path)?)
    }

    fn is_daemon_running(&self) -> bool {
        let path = socket_path();
        path.exists() && UnixStream::connect(path).is_ok()
    }

    fn supports_autostart(&self) -> bool {
        true
    }

    fn start_daemon_background(&self) -> Result<(), ClientError> {
        start_daemon_background()
    }
}

/// Serves each request line with a closure on a socket pair.
#[cfg(test)]
pub struct InMemoryTransport {
    handler: Arc<dyn Fn(String) -> Vec<String> + Send + Sync>,
}

#[cfg(test)]
impl InMemoryTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(String) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[cfg(test)]
impl IpcTransport for InMemoryTransport {
    fn connect(&self) -> Result<Connection, ClientError> {
        let (client, mut server) = UnixStream::pair()?;
        let handler = Arc::clone(&self.handler);
        std::thread::spawn(move || {
            let Ok(reader) = server.try_clone() else {
                return;
            };
            for line in BufReader::new(reader).lines() {
                let Ok(line) = line else { break };
                for mut response in handler(line) {
                    response.push('\n');
                    if server.write_all(response.as_bytes()).is_err() {
                        return;
                    }
                }
            }
        });
        Connection::new(client)
    }

    fn is_daemon_running(&self) -> bool {
        true
    }
}

fn foreground_requested() -> bool {
    std::env::var(FOREGROUND_ENV).is_ok_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn daemon_command() -> Result<Command, ClientError> {
    #[cfg(test)]
    if let Ok(cmd) = std::env::var("MINTY_DAEMON_START_TEST_CMD") {
        return Ok(Command::new(cmd));
    }

    let mut cmd = Command::new(std::env::current_exe()?);
    cmd.args(["daemon", "start", "--foreground"]);
    cmd.env(FOREGROUND_ENV, "1");
    Ok(cmd)
}

fn reap_in_background(mut child: Child) {
    let spawned = std::thread::Builder::new()
        .name("daemon-reaper".to_string())
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Failed to spawn daemon reaper thread");
    }
}

fn log_recent_failure(log: &std::path::Path) {
    let Ok(content) = std::fs::read_to_string(log) else {
        return;
    };
    let tail: Vec<&str> = content.lines().rev().take(5).collect();
    if !tail.is_empty() {
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        error!("Daemon failed to start. Recent log output:\n{}", tail.join("\n"));
    }
}

/// Spawns `minty daemon start` detached from the terminal and waits for
/// its socket to accept connections.
pub fn start_daemon_background() -> Result<(), ClientError> {
    // A daemon child never spawns another daemon.
    if foreground_requested() {
        return Err(ClientError::DaemonNotRunning);
    }

    let log = log_path(&socket_path());
    let stderr = match OpenOptions::new().create(true).append(true).open(&log) {
        Ok(file) => Stdio::from(file),
        Err(e) => {
            warn!(error = %e, path = %log.display(), "Could not open daemon log file");
            Stdio::null()
        }
    };

    let mut child = daemon_command()?
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(stderr)
        .spawn()?;

    let transport = UnixSocketTransport;
    let mut delay = INITIAL_POLL_INTERVAL;
    for _ in 0..MAX_STARTUP_POLLS {
        if let Ok(Some(status)) = child.try_wait() {
            debug!(?status, "Daemon exited during startup");
            log_recent_failure(&log);
            return Err(ClientError::DaemonNotRunning);
        }
        std::thread::sleep(delay);
        if transport.is_daemon_running() {
            reap_in_background(child);
            return Ok(());
        }
        delay = (delay * 2).min(MAX_POLL_INTERVAL);
    }

    log_recent_failure(&log);
    if let Ok(None) = child.try_wait() {
        if let Err(err) = child.kill() {
            warn!(error = %err, "Failed to terminate daemon process");
        }
    }
    let _ = child.wait();
    Err(ClientError::DaemonNotRunning)
}

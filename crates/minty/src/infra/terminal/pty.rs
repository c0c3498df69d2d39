//! Pseudo-terminal process handle.
//!
//! A handle owns the master side of one PTY and the shell running on the
//! slave side. Output and exit status are delivered on channels fed by two
//! background threads so callers never block on the child.

use std::collections::HashMap;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel as channel;
use libc::{POLLERR, POLLHUP, POLLOUT, poll, pollfd};
use portable_pty::Child;
use portable_pty::ChildKiller;
use portable_pty::CommandBuilder;
use portable_pty::MasterPty;
use portable_pty::PtySize;
use portable_pty::native_pty_system;
use tracing::{debug, trace, warn};

use super::error::PtyError;
use super::error::SpawnErrorKind;
use crate::common::mutex_lock_or_recover;
use crate::domain::TerminalSize;

const PTY_READ_CHANNEL_CAPACITY: usize = 256;
const READ_BUFFER_SIZE: usize = 8192;
const KILL_GRACE: Duration = Duration::from_millis(250);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exit code reported when the child's status cannot be collected.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

pub struct SpawnSpec<'a> {
    pub program: &'a str,
    pub args: &'a [String],
    pub cwd: &'a Path,
    pub env: &'a HashMap<String, String>,
    pub size: TerminalSize,
}

pub(crate) enum ReadEvent {
    Data(Vec<u8>),
    Eof,
    Error(String),
}

pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    size: TerminalSize,
    exited: Arc<AtomicBool>,
    read_rx: Option<channel::Receiver<ReadEvent>>,
    exit_rx: Option<channel::Receiver<i32>>,
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.kill();
        }
    }
}

impl PtyHandle {
    pub fn spawn(spec: SpawnSpec<'_>) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(pty_size(spec.size))
            .map_err(|e| PtyError::Open {
                reason: e.to_string(),
                source: None,
            })?;

        let reader = pair.master.try_clone_reader().map_err(|e| PtyError::Open {
            reason: e.to_string(),
            source: None,
        })?;
        let writer = pair.master.take_writer().map_err(|e| PtyError::Open {
            reason: e.to_string(),
            source: None,
        })?;

        let mut cmd = CommandBuilder::new(spec.program);
        cmd.args(spec.args);
        cmd.cwd(spec.cwd);
        cmd.env_clear();
        for (key, value) in spec.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            let kind = e
                .downcast_ref::<io::Error>()
                .map(SpawnErrorKind::from_io)
                .unwrap_or(SpawnErrorKind::Other);
            PtyError::Spawn {
                reason: e.to_string(),
                kind,
            }
        })?;
        // The slave end must close here or the reader never sees EOF.
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let exited = Arc::new(AtomicBool::new(false));
        let exit_rx = spawn_waiter(child, Arc::clone(&exited));
        let read_rx = spawn_reader(reader);

        debug!(pid = ?pid, program = spec.program, cwd = %spec.cwd.display(), "PTY spawned");

        Ok(Self {
            master: pair.master,
            writer: Arc::new(Mutex::new(writer)),
            killer,
            pid,
            size: spec.size,
            exited,
            read_rx: Some(read_rx),
            exit_rx: Some(exit_rx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn size(&self) -> TerminalSize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
    }

    /// Hands the output and exit channels to a single consumer.
    pub(crate) fn take_events(
        &mut self,
    ) -> Option<(channel::Receiver<ReadEvent>, channel::Receiver<i32>)> {
        Some((self.read_rx.take()?, self.exit_rx.take()?))
    }

    pub fn write(&self, data: &[u8]) -> Result<(), PtyError> {
        if data.is_empty() {
            return Ok(());
        }

        let mut writer = mutex_lock_or_recover(&self.writer);
        let mut offset = 0;
        while offset < data.len() {
            match writer.write(&data[offset..]) {
                Ok(0) => {
                    return Err(PtyError::Write {
                        reason: "write returned 0 bytes, PTY closed".to_string(),
                        source: None,
                    });
                }
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.wait_writable()?,
                Err(e) => {
                    return Err(PtyError::Write {
                        reason: e.to_string(),
                        source: Some(e),
                    });
                }
            }
        }
        writer.flush().map_err(|e| PtyError::Write {
            reason: e.to_string(),
            source: Some(e),
        })
    }

    fn wait_writable(&self) -> Result<(), PtyError> {
        let Some(fd) = self.master.as_raw_fd() else {
            return Ok(());
        };
        let mut fds = [pollfd {
            fd,
            events: POLLOUT,
            revents: 0,
        }];
        loop {
            // SAFETY: `fds` is a valid one-element array that outlives the call
            // and `fd` belongs to the master PTY owned by `self`.
            let rc = unsafe { poll(fds.as_mut_ptr(), 1, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(PtyError::Write {
                    reason: err.to_string(),
                    source: Some(err),
                });
            }
            let events = fds[0].revents;
            if events & (POLLHUP | POLLERR) != 0 {
                return Err(PtyError::Write {
                    reason: "PTY closed".to_string(),
                    source: None,
                });
            }
            if events & POLLOUT != 0 {
                return Ok(());
            }
        }
    }

    pub fn resize(&mut self, size: TerminalSize) -> Result<(), PtyError> {
        self.master
            .resize(pty_size(size))
            .map_err(|e| PtyError::Resize {
                reason: e.to_string(),
            })?;
        self.size = size;
        Ok(())
    }

    /// Terminates the child. Calling this on an exited child is a no-op.
    ///
    /// The shell gets SIGHUP first, as a closing terminal would send; if it
    /// is still alive after a short grace period its process group is
    /// killed outright.
    pub fn kill(&mut self) -> Result<(), PtyError> {
        if !self.is_running() {
            return Ok(());
        }

        if let Err(e) = self.killer.kill() {
            if e.raw_os_error() == Some(libc::ESRCH) {
                return Ok(());
            }
            return Err(PtyError::Kill {
                reason: e.to_string(),
                source: Some(e),
            });
        }

        if !self.wait_for_exit(KILL_GRACE) {
            if let Some(pid) = self.pid {
                warn!(pid, "Process ignored SIGHUP; sending SIGKILL to its group");
                force_kill_group(pid);
            }
        }
        Ok(())
    }

    fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if !self.is_running() {
                return true;
            }
            std::thread::sleep(EXIT_POLL_INTERVAL);
        }
        !self.is_running()
    }
}

fn pty_size(size: TerminalSize) -> PtySize {
    PtySize {
        rows: size.rows(),
        cols: size.cols(),
        pixel_width: 0,
        pixel_height: 0,
    }
}

fn force_kill_group(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid targets the process group the PTY
    // child leads; ESRCH for an already-reaped group is ignored.
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
        libc::kill(pid, libc::SIGKILL);
    }
}

fn spawn_waiter(
    mut child: Box<dyn Child + Send + Sync>,
    exited: Arc<AtomicBool>,
) -> channel::Receiver<i32> {
    let (tx, rx) = channel::bounded(1);
    let span = tracing::debug_span!("pty_waiter", pid = ?child.process_id());
    let spawned = std::thread::Builder::new()
        .name("pty-waiter".to_string())
        .spawn(move || {
            let _guard = span.enter();
            let code = match child.wait() {
                Ok(status) => i32::try_from(status.exit_code()).unwrap_or(UNKNOWN_EXIT_CODE),
                Err(e) => {
                    warn!(error = %e, "Failed to collect child exit status");
                    UNKNOWN_EXIT_CODE
                }
            };
            exited.store(true, Ordering::SeqCst);
            trace!(code, "Child exited");
            let _ = tx.send(code);
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Failed to spawn PTY waiter thread");
    }
    rx
}

fn spawn_reader(mut reader: Box<dyn Read + Send>) -> channel::Receiver<ReadEvent> {
    let (tx, rx) = channel::bounded(PTY_READ_CHANNEL_CAPACITY);
    let span = tracing::debug_span!("pty_reader");
    let builder = std::thread::Builder::new().name("pty-reader".to_string());
    let tx_thread = tx.clone();
    if let Err(err) = builder.spawn(move || {
        let _guard = span.enter();
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = tx_thread.send(ReadEvent::Eof);
                    debug!("PTY reader EOF");
                    break;
                }
                Ok(n) => {
                    if tx_thread.send(ReadEvent::Data(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Linux reports EIO on the master once the last slave fd closes.
                Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                    let _ = tx_thread.send(ReadEvent::Eof);
                    debug!("PTY reader hung up");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "PTY reader error");
                    let _ = tx_thread.send(ReadEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    }) {
        let _ = tx.send(ReadEvent::Error(err.to_string()));
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base_env() -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        env.insert("TERM".to_string(), "xterm-256color".to_string());
        env.insert("MINTY_PROBE".to_string(), "probe".to_string());
        env
    }

    fn spawn_sh(script: &str, dir: &Path) -> PtyHandle {
        let args = vec!["-c".to_string(), script.to_string()];
        PtyHandle::spawn(SpawnSpec {
            program: "/bin/sh",
            args: &args,
            cwd: dir,
            env: &base_env(),
            size: TerminalSize::INITIAL,
        })
        .unwrap()
    }

    fn collect_output(rx: &channel::Receiver<ReadEvent>) -> String {
        let mut out = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(5)) {
            match event {
                ReadEvent::Data(data) => out.extend(data),
                ReadEvent::Eof | ReadEvent::Error(_) => break,
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_spawn_reports_output_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let mut pty = spawn_sh("printf hello; exit 3", dir.path());
        let (read_rx, exit_rx) = pty.take_events().unwrap();

        assert!(collect_output(&read_rx).contains("hello"));
        assert_eq!(exit_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 3);
        assert!(!pty.is_running());
        assert!(pty.take_events().is_none());
    }

    #[test]
    fn test_spawn_uses_cwd_and_env_only() {
        let dir = TempDir::new().unwrap();
        let mut pty = spawn_sh("pwd; echo \"[$MINTY_PROBE]\"", dir.path());
        let (read_rx, _exit_rx) = pty.take_events().unwrap();
        let output = collect_output(&read_rx);

        let canonical = dir.path().canonicalize().unwrap();
        assert!(
            output.contains(canonical.to_str().unwrap())
                || output.contains(dir.path().to_str().unwrap())
        );
        assert!(output.contains("[probe]"), "got {output:?}");
    }

    #[test]
    fn test_spawn_missing_program_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let result = PtyHandle::spawn(SpawnSpec {
            program: "/definitely/not/a/shell",
            args: &[],
            cwd: dir.path(),
            env: &base_env(),
            size: TerminalSize::INITIAL,
        });
        assert!(matches!(result, Err(PtyError::Spawn { .. })));
    }

    #[test]
    fn test_kill_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut pty = spawn_sh("sleep 30", dir.path());
        assert!(pty.is_running());

        pty.kill().unwrap();
        assert!(pty.wait_for_exit(Duration::from_secs(2)));
        pty.kill().unwrap();
    }

    #[test]
    fn test_resize_updates_size() {
        let dir = TempDir::new().unwrap();
        let mut pty = spawn_sh("sleep 5", dir.path());
        pty.resize(TerminalSize::try_new(80, 24).unwrap()).unwrap();
        assert_eq!(pty.size().cols(), 80);
        assert_eq!(pty.size().rows(), 24);
    }

    #[test]
    fn test_write_reaches_child_stdin() {
        let dir = TempDir::new().unwrap();
        let mut pty = spawn_sh("read line; echo \"got:$line\"", dir.path());
        let (read_rx, _exit_rx) = pty.take_events().unwrap();
        pty.write(b"ping\n").unwrap();
        assert!(collect_output(&read_rx).contains("got:ping"));
    }
}

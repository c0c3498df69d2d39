//! Append-only record of the shells the daemon has spawned.
//!
//! If the daemon dies without tearing its sessions down, the shells it
//! started keep running with nobody reading their output. The journal lets
//! the next daemon find and reap them.

use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use sysinfo::Pid;
use sysinfo::ProcessRefreshKind;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;
use sysinfo::UpdateKind;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::error_codes::{self, ErrorCategory};

const COMPACT_THRESHOLD_BYTES: u64 = 1_048_576;
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const TERMINATE_GRACE: Duration = Duration::from_millis(500);
const KILL_WAIT: Duration = Duration::from_millis(500);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Session journal {operation} failed: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Timed out after {0:?} waiting for the session journal lock")]
    LockTimeout(Duration),
}

impl PersistenceError {
    fn io(operation: &'static str, source: io::Error) -> Self {
        PersistenceError::Io { operation, source }
    }

    pub fn code(&self) -> i32 {
        match self {
            PersistenceError::LockTimeout(_) => error_codes::LOCK_TIMEOUT,
            _ => error_codes::PERSISTENCE_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn suggestion(&self) -> String {
        match self {
            PersistenceError::LockTimeout(_) => {
                "Another minty process holds the journal lock. Retry shortly.".to_string()
            }
            _ => "Check that the session store directory is writable (MINTY_SESSION_STORE)."
                .to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistenceError::LockTimeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub session_id: String,
    pub pid: u32,
    pub shell: String,
    pub cwd: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JournalEntry {
    Upsert(JournalRecord),
    Remove { session_id: String },
}

pub struct SessionJournal {
    path: PathBuf,
    lock_path: PathBuf,
}

impl SessionJournal {
    pub fn new(path: PathBuf) -> Self {
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, record: JournalRecord) -> Result<(), PersistenceError> {
        let _lock = self.lock()?;
        self.append(&JournalEntry::Upsert(record))?;
        self.maybe_compact()
    }

    pub fn forget(&self, session_id: &str) -> Result<(), PersistenceError> {
        let _lock = self.lock()?;
        self.append(&JournalEntry::Remove {
            session_id: session_id.to_string(),
        })?;
        self.maybe_compact()
    }

    /// Live records, in no particular order.
    pub fn load(&self) -> Vec<JournalRecord> {
        match self.lock() {
            Ok(_lock) => self.replay(),
            Err(e) => {
                warn!(error = %e, "Loading session journal without its lock");
                self.replay()
            }
        }
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        let _lock = self.lock()?;
        self.rewrite(&[])
    }

    /// Terminates shells a previous daemon left running and empties the
    /// journal. Returns how many records were reaped.
    pub fn cleanup_stale_sessions(&self) -> Result<usize, PersistenceError> {
        let _lock = self.lock()?;
        let records = self.replay();
        let mut reaped = 0;
        for record in &records {
            if reap_orphan(record) {
                reaped += 1;
            }
        }
        self.rewrite(&[])?;
        if !records.is_empty() {
            info!(records = records.len(), reaped, "Cleaned up stale sessions");
        }
        Ok(reaped)
    }

    fn lock(&self) -> Result<File, PersistenceError> {
        self.ensure_dir()?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| PersistenceError::io("open_lock", e))?;

        let fd = file.as_raw_fd();
        let start = Instant::now();
        let mut backoff = Duration::from_millis(1);
        loop {
            // SAFETY: `fd` comes from `file`, which stays open for the whole loop.
            let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
            if rc == 0 {
                return Ok(file);
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EWOULDBLOCK) {
                return Err(PersistenceError::io("flock", err));
            }
            if start.elapsed() > LOCK_TIMEOUT {
                return Err(PersistenceError::LockTimeout(LOCK_TIMEOUT));
            }
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(Duration::from_millis(100));
        }
    }

    fn ensure_dir(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io("create_dir", e))?;
        }
        Ok(())
    }

    fn replay(&self) -> Vec<JournalRecord> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to open session journal");
                return Vec::new();
            }
        };

        let mut live: HashMap<String, JournalRecord> = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to read session journal line");
                    continue;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(trimmed) {
                Ok(JournalEntry::Upsert(record)) => {
                    live.insert(record.session_id.clone(), record);
                }
                Ok(JournalEntry::Remove { session_id }) => {
                    live.remove(&session_id);
                }
                Err(e) => warn!(error = %e, "Skipping malformed session journal entry"),
            }
        }
        live.into_values().collect()
    }

    fn append(&self, entry: &JournalEntry) -> Result<(), PersistenceError> {
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::io("open", e))?;
        writeln!(file, "{}", line).map_err(|e| PersistenceError::io("append", e))
    }

    fn rewrite(&self, records: &[JournalRecord]) -> Result<(), PersistenceError> {
        let temp_path = self.path.with_extension("jsonl.tmp");
        let file = File::create(&temp_path).map_err(|e| PersistenceError::io("create_temp", e))?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(&JournalEntry::Upsert(record.clone()))?;
            writeln!(writer, "{}", line).map_err(|e| PersistenceError::io("write", e))?;
        }
        writer
            .flush()
            .map_err(|e| PersistenceError::io("flush", e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| PersistenceError::io("rename", e))
    }

    fn maybe_compact(&self) -> Result<(), PersistenceError> {
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if size < COMPACT_THRESHOLD_BYTES {
            return Ok(());
        }
        let records = self.replay();
        debug!(bytes = size, records = records.len(), "Compacting session journal");
        self.rewrite(&records)
    }
}

/// Returns true when the recorded shell is no longer running afterwards
/// because of us.
fn reap_orphan(record: &JournalRecord) -> bool {
    if record.pid == 0 || record.pid == std::process::id() {
        return false;
    }
    if !is_process_running(record.pid) {
        return false;
    }
    if !process_matches_shell(record.pid, &record.shell) {
        warn!(
            session_id = %record.session_id,
            pid = record.pid,
            "Recorded PID now belongs to another program; leaving it alone"
        );
        return false;
    }
    let stopped = terminate_process_group(record.pid);
    if !stopped {
        warn!(session_id = %record.session_id, pid = record.pid, "Orphaned shell survived SIGKILL");
    }
    stopped
}

fn process_matches_shell(pid: u32, shell: &str) -> bool {
    let expected = Path::new(shell)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| shell.to_string());
    if expected.is_empty() {
        return false;
    }

    let pid = Pid::from_u32(pid);
    let refresh = ProcessRefreshKind::nothing()
        .with_cmd(UpdateKind::Always)
        .with_exe(UpdateKind::Always);
    let mut system = System::new();
    system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);
    let Some(process) = system.process(pid) else {
        return false;
    };

    let name = process.name().to_string_lossy();
    // Login shells show up as "-bash".
    if name.trim_start_matches('-') == expected {
        return true;
    }
    if let Some(exe) = process.exe() {
        if exe.file_name().is_some_and(|n| n.to_string_lossy() == expected) {
            return true;
        }
    }
    process
        .cmd()
        .first()
        .is_some_and(|arg0| arg0.to_string_lossy().trim_start_matches('-').ends_with(&expected))
}

fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only performs the existence and permission check.
    unsafe { libc::kill(pid, 0) == 0 }
}

fn reap_if_child(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    let mut status: libc::c_int = 0;
    // SAFETY: WNOHANG never blocks; a pid that is not our child yields ECHILD.
    unsafe {
        libc::waitpid(pid, &mut status, libc::WNOHANG);
    }
}

fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        reap_if_child(pid);
        if !is_process_running(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

fn terminate_process_group(pid: u32) -> bool {
    let Ok(pid_t) = libc::pid_t::try_from(pid) else {
        return false;
    };

    // SAFETY: a negative pid targets the group the shell leads.
    let rc = unsafe { libc::kill(-pid_t, libc::SIGTERM) };
    if rc != 0 && io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH) {
        return true;
    }
    if wait_for_exit(pid, TERMINATE_GRACE) {
        return true;
    }

    // SAFETY: as above.
    unsafe {
        libc::kill(-pid_t, libc::SIGKILL);
        libc::kill(pid_t, libc::SIGKILL);
    }
    wait_for_exit(pid, KILL_WAIT)
}

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use crate::common::DaemonError;

/// Exclusive `flock` on `<socket>.lock`, released when dropped or when the
/// process dies. The file holds the owner's PID.
pub struct LockFile {
    _file: File,
}

impl LockFile {
    pub fn acquire(lock_path: &Path) -> Result<Self, DaemonError> {
        let mut lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|source| DaemonError::LockFailed {
                operation: "open lock file",
                source,
            })?;

        // SAFETY: the fd belongs to `lock_file`, which `LockFile` keeps open.
        let result = unsafe { libc::flock(lock_file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(code) if code == libc::EWOULDBLOCK => DaemonError::AlreadyRunning,
                _ => DaemonError::LockFailed {
                    operation: "lock the lock file",
                    source: err,
                },
            });
        }

        lock_file
            .set_len(0)
            .map_err(|source| DaemonError::LockFailed {
                operation: "truncate lock file",
                source,
            })?;
        writeln!(lock_file, "{}", std::process::id()).map_err(|source| DaemonError::LockFailed {
            operation: "write PID",
            source,
        })?;

        Ok(Self { _file: lock_file })
    }
}

/// PID written by whoever holds (or last held) the lock.
pub fn lock_holder_pid(lock_path: &Path) -> Option<u32> {
    std::fs::read_to_string(lock_path)
        .ok()
        .and_then(|contents| contents.trim().parse().ok())
}

pub fn remove_lock_file(lock_path: &Path) {
    if lock_path.exists() {
        let _ = std::fs::remove_file(lock_path);
    }
}

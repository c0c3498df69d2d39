//! Socket and sidecar file locations.

use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

pub const SOCKET_ENV: &str = "MINTY_SOCKET";
const SOCKET_NAME: &str = "minty.sock";

pub fn socket_path() -> PathBuf {
    if let Some(custom) = std::env::var_os(SOCKET_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(custom);
        debug!(socket = %path.display(), "Using custom socket path");
        return path;
    }

    let path = std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|v| !v.is_empty())
        .map(|dir| PathBuf::from(dir).join(SOCKET_NAME))
        .unwrap_or_else(|| PathBuf::from("/tmp").join(SOCKET_NAME));
    debug!(socket = %path.display(), "Resolved socket path");
    path
}

/// `<socket>.lock`, holding the daemon PID under an exclusive flock.
pub fn lock_path(socket: &Path) -> PathBuf {
    sibling(socket, ".lock")
}

/// `<socket>.log`, where a background daemon's stderr goes.
pub fn log_path(socket: &Path) -> PathBuf {
    sibling(socket, ".log")
}

fn sibling(socket: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(socket.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

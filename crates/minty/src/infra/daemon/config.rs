//! Daemon configuration.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_MAX_SESSIONS: usize = 64;
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONNECTIONS: usize = 64;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_REQUEST_BYTES: usize = 1_048_576;
const DEFAULT_WINDOW_QUEUE: usize = 4096;

const STATE_DIR_NAME: &str = ".minty";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    max_connections: usize,
    idle_timeout: Duration,
    max_request_bytes: usize,
    max_sessions: usize,
    exec_timeout: Duration,
    window_queue: usize,
    keep_sessions: bool,
    session_store: PathBuf,
    library_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl DaemonConfig {
    /// Built-in defaults, ignoring the environment.
    pub fn defaults() -> Self {
        let state = state_dir();
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_sessions: DEFAULT_MAX_SESSIONS,
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            window_queue: DEFAULT_WINDOW_QUEUE,
            keep_sessions: false,
            session_store: state.join("sessions.jsonl"),
            library_dir: state.join("library"),
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        Self {
            max_connections: parse_env("MINTY_MAX_CONNECTIONS", defaults.max_connections),
            idle_timeout: Duration::from_secs(parse_env(
                "MINTY_IDLE_TIMEOUT",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )),
            max_request_bytes: parse_env("MINTY_MAX_REQUEST_BYTES", defaults.max_request_bytes),
            max_sessions: parse_env("MINTY_MAX_SESSIONS", defaults.max_sessions),
            exec_timeout: Duration::from_secs(parse_env(
                "MINTY_EXEC_TIMEOUT_SECS",
                DEFAULT_EXEC_TIMEOUT_SECS,
            )),
            window_queue: parse_env("MINTY_WINDOW_QUEUE", defaults.window_queue),
            keep_sessions: parse_env_flag("MINTY_KEEP_SESSIONS"),
            session_store: env_path("MINTY_SESSION_STORE").unwrap_or(defaults.session_store),
            library_dir: env_path("MINTY_LIBRARY_DIR").unwrap_or(defaults.library_dir),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn exec_timeout(&self) -> Duration {
        self.exec_timeout
    }

    pub fn window_queue(&self) -> usize {
        self.window_queue
    }

    /// When false, closing the last display surface terminates every session.
    pub fn keep_sessions(&self) -> bool {
        self.keep_sessions
    }

    pub fn session_store(&self) -> &PathBuf {
        &self.session_store
    }

    pub fn library_dir(&self) -> &PathBuf {
        &self.library_dir
    }

    pub fn with_max_request_bytes(mut self, max: usize) -> Self {
        self.max_request_bytes = max;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn with_keep_sessions(mut self, keep: bool) -> Self {
        self.keep_sessions = keep;
        self
    }

    pub fn with_session_store(mut self, path: PathBuf) -> Self {
        self.session_store = path;
        self
    }

    pub fn with_library_dir(mut self, path: PathBuf) -> Self {
        self.library_dir = path;
        self
    }
}

fn state_dir() -> PathBuf {
    env::var("HOME")
        .ok()
        .filter(|home| !home.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join(STATE_DIR_NAME)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    let Ok(value) = env::var(key) else {
        return default;
    };
    if value.trim().is_empty() {
        return default;
    }
    match value.trim().parse::<T>() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(value = %value, key, "Invalid numeric config; using default");
            default
        }
    }
}

fn parse_env_flag(key: &str) -> bool {
    matches!(
        env::var(key).ok().as_deref().map(str::trim),
        Some("1" | "true" | "yes" | "on")
    )
}

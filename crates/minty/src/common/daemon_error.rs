use crate::common::error_codes::{self, ErrorCategory};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Failed to bind socket: {0}")]
    SocketBind(String),
    #[error("Another daemon instance is already running")]
    AlreadyRunning,
    #[error("Failed to {operation}: {source}")]
    LockFailed {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to setup signal handler: {0}")]
    SignalSetup(String),
    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),
}

impl DaemonError {
    pub fn code(&self) -> i32 {
        error_codes::DAEMON_ERROR
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DaemonError::AlreadyRunning => ErrorCategory::Busy,
            _ => ErrorCategory::External,
        }
    }

    pub fn suggestion(&self) -> String {
        match self {
            DaemonError::SocketBind(_) => {
                "Check that the socket directory is writable, or point MINTY_SOCKET elsewhere."
                    .to_string()
            }
            DaemonError::AlreadyRunning => {
                "A daemon is already serving this socket. Use 'minty daemon status' or 'minty daemon stop'."
                    .to_string()
            }
            DaemonError::LockFailed { .. } => {
                "Lock file issue. Remove the stale '<socket>.lock' file and retry.".to_string()
            }
            DaemonError::SignalSetup(_) => {
                "Signal handler setup failed. Check system signal configuration.".to_string()
            }
            DaemonError::ThreadPool(_) => {
                "Thread pool creation failed. Check system thread limits (ulimit -u).".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DaemonError::LockFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_running_is_busy_and_not_retryable() {
        let err = DaemonError::AlreadyRunning;
        assert_eq!(err.category(), ErrorCategory::Busy);
        assert!(!err.is_retryable());
        assert!(err.suggestion().contains("daemon status"));
    }

    #[test]
    fn test_lock_failed_message_includes_operation() {
        let err = DaemonError::LockFailed {
            operation: "open lock file",
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("Failed to open lock file"));
        assert!(err.is_retryable());
        assert_eq!(err.code(), error_codes::DAEMON_ERROR);
    }
}

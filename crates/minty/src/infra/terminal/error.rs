use crate::common::error_codes::{self, ErrorCategory};
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnErrorKind {
    NotFound,
    PermissionDenied,
    Other,
}

impl SpawnErrorKind {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SpawnErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => SpawnErrorKind::PermissionDenied,
            _ => SpawnErrorKind::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY: {reason}")]
    Open {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("Failed to spawn process: {reason}")]
    Spawn {
        reason: String,
        kind: SpawnErrorKind,
    },
    #[error("Failed to write to PTY: {reason}")]
    Write {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
    #[error("Failed to resize PTY: {reason}")]
    Resize { reason: String },
    #[error("Failed to terminate process: {reason}")]
    Kill {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl PtyError {
    pub fn code(&self) -> i32 {
        match self {
            PtyError::Spawn {
                kind: SpawnErrorKind::NotFound,
                ..
            } => error_codes::COMMAND_NOT_FOUND,
            PtyError::Spawn {
                kind: SpawnErrorKind::PermissionDenied,
                ..
            } => error_codes::PERMISSION_DENIED,
            PtyError::Spawn { .. } => error_codes::SPAWN_FAILED,
            _ => error_codes::PTY_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn suggestion(&self) -> String {
        match self {
            PtyError::Open { .. } => {
                "PTY allocation failed. Check system resource limits (ulimit -n).".to_string()
            }
            PtyError::Spawn { kind, .. } => match kind {
                SpawnErrorKind::NotFound => {
                    "Shell not found. Check $SHELL or install /bin/bash.".to_string()
                }
                SpawnErrorKind::PermissionDenied => {
                    "Permission denied. Check the shell and working directory permissions."
                        .to_string()
                }
                SpawnErrorKind::Other => {
                    "Process spawn failed. Check the working directory exists.".to_string()
                }
            },
            PtyError::Write { .. } => {
                "The shell stopped accepting input. It may have exited; run 'minty sessions'."
                    .to_string()
            }
            PtyError::Resize { .. } => "Resize failed. Try again.".to_string(),
            PtyError::Kill { .. } => {
                "The process could not be signalled. It may belong to another user.".to_string()
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, PtyError::Write { .. } | PtyError::Resize { .. })
    }

    pub fn operation(&self) -> &'static str {
        match self {
            PtyError::Open { .. } => "open",
            PtyError::Spawn { .. } => "spawn",
            PtyError::Write { .. } => "write",
            PtyError::Resize { .. } => "resize",
            PtyError::Kill { .. } => "kill",
        }
    }
}

//! CLI-side errors with structured context.
//!
//! Every error maps to a sysexits-style exit code; `to_json` is what
//! `--format json` prints on stderr.

use std::io;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::app::commands::OutputFormat;
use crate::common::error_codes::{self, ErrorCategory};
use crate::infra::ipc::ClientError;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    /// LSB: program is not running (for `daemon status`).
    pub const NOT_RUNNING: i32 = 3;
    pub const USAGE: i32 = 64;
    pub const UNAVAILABLE: i32 = 69;
    pub const IOERR: i32 = 74;
}

fn exit_code_for_category(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::InvalidInput => exit_codes::USAGE,
        ErrorCategory::NotFound | ErrorCategory::Busy => exit_codes::UNAVAILABLE,
        ErrorCategory::External | ErrorCategory::Internal | ErrorCategory::Timeout => {
            exit_codes::IOERR
        }
    }
}

pub fn exit_code_for_client_error(error: &ClientError) -> i32 {
    match error {
        ClientError::DaemonNotRunning => exit_codes::UNAVAILABLE,
        other => other
            .category()
            .map(exit_code_for_category)
            .unwrap_or(exit_codes::GENERAL_ERROR),
    }
}

/// Attach mode errors.
#[derive(Error, Debug)]
pub enum AttachError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] io::Error),

    #[error("Session write failed: {0}")]
    SessionWrite(String),

    #[error("Output stream failed: {0}")]
    Stream(String),

    #[error("Event read failed")]
    EventRead,
}

impl AttachError {
    pub fn code(&self) -> i32 {
        match self {
            AttachError::Stream(_) => error_codes::DAEMON_ERROR,
            _ => error_codes::PTY_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::External
    }

    pub fn context(&self) -> Value {
        let (operation, reason) = match self {
            AttachError::Terminal(e) => ("terminal", e.to_string()),
            AttachError::SessionWrite(reason) => ("session_write", reason.clone()),
            AttachError::Stream(reason) => ("subscribe", reason.clone()),
            AttachError::EventRead => ("event_read", "Failed to read terminal events".to_string()),
        };
        json!({ "operation": operation, "reason": reason })
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            AttachError::Terminal(_) | AttachError::EventRead => {
                "Terminal mode error. Try restarting your terminal."
            }
            AttachError::SessionWrite(_) => {
                "The session may have ended. Run 'minty sessions' to check."
            }
            AttachError::Stream(_) => "Check the daemon with: minty daemon status",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AttachError::SessionWrite(_) | AttachError::Stream(_))
    }

    pub fn exit_code(&self) -> i32 {
        exit_code_for_category(self.category())
    }

    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
            "category": self.category().as_str(),
            "retryable": self.is_retryable(),
            "context": self.context(),
            "suggestion": self.suggestion()
        })
    }
}

/// `daemon status` found nothing listening. Its output is already printed,
/// so only the exit code remains.
#[derive(Error, Debug)]
#[error("Daemon is not running")]
pub struct DaemonNotRunningError;

/// An error already rendered for the selected output format.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct CliError {
    pub exit_code: i32,
    pub format: OutputFormat,
    pub message: String,
    pub json: Option<Value>,
}

impl CliError {
    pub fn new(
        format: OutputFormat,
        message: impl Into<String>,
        json: Option<Value>,
        exit_code: i32,
    ) -> Self {
        Self {
            exit_code,
            format,
            message: message.into(),
            json,
        }
    }
}

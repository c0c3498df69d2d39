use thiserror::Error;

use crate::common::error_codes::{self, ErrorCategory};
use crate::domain::SessionId;
use crate::domain::TerminalSizeError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no active session")]
    NotFound(SessionId),
    #[error("Session limit reached: maximum {0} sessions allowed")]
    LimitReached(usize),
    #[error("Working directory does not exist: {0}")]
    InvalidDirectory(String),
    #[error("Invalid terminal size: {0}")]
    InvalidSize(#[from] TerminalSizeError),
    #[error("Session {0} was removed while it was starting")]
    Superseded(SessionId),
    #[error("Terminal {operation} failed: {reason}")]
    Terminal {
        operation: &'static str,
        reason: String,
        code: i32,
    },
}

impl SessionError {
    pub fn code(&self) -> i32 {
        match self {
            SessionError::NotFound(_) | SessionError::Superseded(_) => {
                error_codes::SESSION_NOT_FOUND
            }
            SessionError::LimitReached(_) => error_codes::SESSION_LIMIT,
            SessionError::InvalidDirectory(_) => error_codes::DIRECTORY_ERROR,
            SessionError::InvalidSize(_) => error_codes::INVALID_PARAMS,
            SessionError::Terminal { code, .. } => *code,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn is_retryable(&self) -> bool {
        error_codes::is_retryable(self.code())
    }
}

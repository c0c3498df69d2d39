//! Errors the handlers surface as JSON-RPC error objects.

use thiserror::Error;

use crate::adapters::rpc::RpcResponse;
use crate::common::error_codes::{self, ErrorCategory};
use crate::infra::daemon::{CoordinatorError, WindowError};
use crate::usecases::ports::SessionError;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Window(#[from] WindowError),
}

impl From<CoordinatorError> for DomainError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::Session(e) => DomainError::Session(e),
            CoordinatorError::Window(e) => DomainError::Window(e),
        }
    }
}

impl DomainError {
    pub fn code(&self) -> i32 {
        match self {
            DomainError::Session(e) => e.code(),
            DomainError::Window(e) => e.code(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        error_codes::category_for_code(self.code())
    }

    pub fn suggestion(&self) -> String {
        match self {
            DomainError::Session(SessionError::NotFound(_) | SessionError::Superseded(_)) => {
                "Run 'minty sessions' to list active sessions.".to_string()
            }
            DomainError::Session(SessionError::LimitReached(_)) => {
                "Close unused sessions with 'minty kill <id>' or raise MINTY_MAX_SESSIONS."
                    .to_string()
            }
            DomainError::Session(SessionError::InvalidDirectory(_)) => {
                "Pass an existing directory as the working directory.".to_string()
            }
            DomainError::Session(SessionError::InvalidSize(_)) => {
                "Use a geometry within the supported column and row range.".to_string()
            }
            DomainError::Session(SessionError::Terminal { .. }) => {
                "Check the shell (SHELL) and system PTY limits, then retry.".to_string()
            }
            DomainError::Window(WindowError::NotFound(_)) => {
                "Call the 'windows' method to list live windows."
                    .to_string()
            }
            DomainError::Window(WindowError::AlreadyAttached(_)) => {
                "Each window accepts one subscriber. Subscribe without 'window' to get a new one."
                    .to_string()
            }
        }
    }

    pub fn into_response(self, id: u64) -> RpcResponse {
        RpcResponse::domain_error(
            id,
            self.code(),
            &self.to_string(),
            self.category().as_str(),
            Some(self.suggestion()),
        )
    }
}

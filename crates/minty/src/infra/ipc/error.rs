use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::common::error_codes::{self, ErrorCategory};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to connect to daemon: {0}")]
    ConnectionFailed(#[from] std::io::Error),

    #[error("Failed to serialize request: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("RPC error ({code}): {message}")]
    RpcError {
        code: i32,
        message: String,
        category: Option<ErrorCategory>,
        retryable: bool,
        suggestion: Option<String>,
    },

    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Invalid response from daemon")]
    InvalidResponse,

    #[error("Failed to send signal to process {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::RpcError { retryable, .. } => *retryable,
            ClientError::ConnectionFailed(_) => true,
            _ => false,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ClientError::RpcError { category, .. } => *category,
            ClientError::ConnectionFailed(_)
            | ClientError::DaemonNotRunning
            | ClientError::SignalFailed { .. } => Some(ErrorCategory::External),
            _ => Some(ErrorCategory::Internal),
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            ClientError::RpcError { suggestion, .. } => suggestion.as_deref(),
            ClientError::DaemonNotRunning => Some("Start the daemon with: minty daemon start"),
            ClientError::ConnectionFailed(_) => {
                Some("Check the daemon with: minty daemon status")
            }
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ClientError::RpcError { code, .. } => *code,
            _ => error_codes::GENERIC_ERROR,
        }
    }

    pub fn to_json(&self) -> Value {
        let message = match self {
            ClientError::RpcError { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let mut obj = json!({
            "code": self.code(),
            "message": message,
            "retryable": self.is_retryable(),
        });
        if let Some(category) = self.category() {
            obj["category"] = json!(category.as_str());
        }
        if let Some(suggestion) = self.suggestion() {
            obj["suggestion"] = json!(suggestion);
        }
        obj
    }
}

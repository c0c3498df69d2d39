//! Error codes carried in JSON-RPC error objects.
//!
//! Codes sit in the JSON-RPC "server error" range (-32000 to -32099).
//! -32700 and -32600..-32603 are the reserved protocol codes.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub const GENERIC_ERROR: i32 = -32000;
pub const SESSION_NOT_FOUND: i32 = -32001;
pub const WINDOW_NOT_FOUND: i32 = -32002;
pub const WINDOW_ATTACHED: i32 = -32003;
pub const SESSION_LIMIT: i32 = -32006;
pub const LOCK_TIMEOUT: i32 = -32007;
pub const PTY_ERROR: i32 = -32008;
pub const SPAWN_FAILED: i32 = -32009;
pub const COMMAND_TIMEOUT: i32 = -32013;
pub const COMMAND_NOT_FOUND: i32 = -32014;
pub const PERMISSION_DENIED: i32 = -32015;
pub const DAEMON_ERROR: i32 = -32016;
pub const PERSISTENCE_ERROR: i32 = -32017;
pub const LIBRARY_ERROR: i32 = -32018;
pub const INDEX_ERROR: i32 = -32019;
pub const DIRECTORY_ERROR: i32 = -32020;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    InvalidInput,
    Busy,
    Internal,
    External,
    Timeout,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::Busy => "busy",
            ErrorCategory::Internal => "internal",
            ErrorCategory::External => "external",
            ErrorCategory::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_found" => Ok(ErrorCategory::NotFound),
            "invalid_input" => Ok(ErrorCategory::InvalidInput),
            "busy" => Ok(ErrorCategory::Busy),
            "internal" => Ok(ErrorCategory::Internal),
            "external" => Ok(ErrorCategory::External),
            "timeout" => Ok(ErrorCategory::Timeout),
            _ => Err(()),
        }
    }
}

pub fn category_for_code(code: i32) -> ErrorCategory {
    match code {
        SESSION_NOT_FOUND | WINDOW_NOT_FOUND | COMMAND_NOT_FOUND | METHOD_NOT_FOUND => {
            ErrorCategory::NotFound
        }
        INVALID_PARAMS | INVALID_REQUEST | PARSE_ERROR | DIRECTORY_ERROR => {
            ErrorCategory::InvalidInput
        }
        SESSION_LIMIT | LOCK_TIMEOUT | WINDOW_ATTACHED => ErrorCategory::Busy,
        COMMAND_TIMEOUT => ErrorCategory::Timeout,
        PTY_ERROR | SPAWN_FAILED | PERMISSION_DENIED | DAEMON_ERROR | PERSISTENCE_ERROR
        | INDEX_ERROR => ErrorCategory::External,
        _ => ErrorCategory::Internal,
    }
}

pub fn is_retryable(code: i32) -> bool {
    matches!(code, LOCK_TIMEOUT | SESSION_LIMIT | COMMAND_TIMEOUT)
}

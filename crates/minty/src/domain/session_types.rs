//! Session and window identifiers and terminal geometry.

use std::fmt;
use std::ops::Deref;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind} ID cannot be empty or whitespace-only")]
    Empty { kind: &'static str },
    #[error("{kind} ID is longer than {max} characters")]
    TooLong { kind: &'static str, max: usize },
    #[error("{kind} ID may not contain control characters or '/'")]
    InvalidCharacter { kind: &'static str },
}

const MAX_ID_LEN: usize = 128;

fn validate_id(kind: &'static str, id: &str) -> Result<(), IdError> {
    if id.trim().is_empty() {
        return Err(IdError::Empty { kind });
    }
    if id.len() > MAX_ID_LEN {
        return Err(IdError::TooLong {
            kind,
            max: MAX_ID_LEN,
        });
    }
    if id.chars().any(|c| c.is_control() || c == '/') {
        return Err(IdError::InvalidCharacter { kind });
    }
    Ok(())
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Caller-chosen identifier naming one interactive shell (a tab).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn try_new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_id("Session", &id)?;
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(short_uuid())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for SessionId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Opaque handle for a display surface. Sessions only ever hold this id,
/// never the surface itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowId(String);

impl WindowId {
    pub fn try_new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        validate_id("Window", &id)?;
        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(short_uuid())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WindowId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<WindowId> for String {
    fn from(id: WindowId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminalSizeError {
    #[error("Columns ({cols}) must be between {min} and {max}")]
    Columns { cols: u16, min: u16, max: u16 },
    #[error("Rows ({rows}) must be between {min} and {max}")]
    Rows { rows: u16, min: u16, max: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TerminalSize {
    cols: u16,
    rows: u16,
}

impl TerminalSize {
    pub const MIN_COLS: u16 = 2;
    pub const MAX_COLS: u16 = 1000;
    pub const MIN_ROWS: u16 = 1;
    pub const MAX_ROWS: u16 = 500;

    /// Geometry every new session starts with; the UI resizes right after.
    pub const INITIAL: TerminalSize = TerminalSize {
        cols: 120,
        rows: 30,
    };

    pub fn try_new(cols: u16, rows: u16) -> Result<Self, TerminalSizeError> {
        if !(Self::MIN_COLS..=Self::MAX_COLS).contains(&cols) {
            return Err(TerminalSizeError::Columns {
                cols,
                min: Self::MIN_COLS,
                max: Self::MAX_COLS,
            });
        }
        if !(Self::MIN_ROWS..=Self::MAX_ROWS).contains(&rows) {
            return Err(TerminalSizeError::Rows {
                rows,
                min: Self::MIN_ROWS,
                max: Self::MAX_ROWS,
            });
        }
        Ok(Self { cols, rows })
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Snapshot of one live session as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub pid: Option<u32>,
    pub cols: u16,
    pub rows: u16,
    pub running: bool,
    pub shell: String,
    pub window: Option<WindowId>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_rejects_blank_and_slash() {
        assert_eq!(
            SessionId::try_new("  "),
            Err(IdError::Empty { kind: "Session" })
        );
        assert!(SessionId::try_new("a/b").is_err());
        assert!(SessionId::try_new("tab\n1").is_err());
        assert!(SessionId::try_new("x".repeat(129)).is_err());
        assert_eq!(SessionId::try_new("1712345678901").unwrap().as_str(), "1712345678901");
    }

    #[test]
    fn test_generated_ids_are_short_and_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
        assert_eq!(WindowId::generate().as_str().len(), 8);
    }

    #[test]
    fn test_session_id_deserialize_validates() {
        let ok: SessionId = serde_json::from_str("\"tab-1\"").unwrap();
        assert_eq!(ok.as_str(), "tab-1");
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
    }

    #[test]
    fn test_terminal_size_bounds() {
        assert!(TerminalSize::try_new(80, 24).is_ok());
        assert!(matches!(
            TerminalSize::try_new(1, 24),
            Err(TerminalSizeError::Columns { cols: 1, .. })
        ));
        assert!(matches!(
            TerminalSize::try_new(80, 0),
            Err(TerminalSizeError::Rows { rows: 0, .. })
        ));
        assert_eq!(TerminalSize::default(), TerminalSize::INITIAL);
        assert_eq!(TerminalSize::INITIAL.cols(), 120);
        assert_eq!(TerminalSize::INITIAL.rows(), 30);
    }
}

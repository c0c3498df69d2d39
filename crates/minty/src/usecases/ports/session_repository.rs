use std::path::PathBuf;

use crate::domain::SessionId;
use crate::domain::SessionInfo;
use crate::domain::TerminalSize;
use crate::domain::WindowId;

use super::SessionError;

#[derive(Debug, Clone)]
pub struct CreateSession {
    pub id: SessionId,
    pub cwd: PathBuf,
    pub owner: Option<WindowId>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: SessionId,
    pub cwd: String,
    pub pid: Option<u32>,
}

/// Owner of the id -> PTY mapping.
///
/// `create` replaces any live session with the same id; `remove` is
/// idempotent and also cancels a create that is still in flight.
pub trait SessionRepository: Send + Sync {
    fn create(&self, request: CreateSession) -> Result<CreatedSession, SessionError>;
    fn remove(&self, id: &SessionId) -> bool;
    fn write(&self, id: &SessionId, data: &[u8]) -> Result<(), SessionError>;
    fn resize(&self, id: &SessionId, size: TerminalSize) -> Result<(), SessionError>;
    fn info(&self, id: &SessionId) -> Result<SessionInfo, SessionError>;
    fn list(&self) -> Vec<SessionInfo>;
    fn session_count(&self) -> usize;
    fn shutdown_all(&self) -> usize;
}

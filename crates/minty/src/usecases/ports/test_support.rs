//! In-memory port implementations for use case tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::SessionId;
use crate::domain::SessionInfo;
use crate::domain::TerminalSize;

use super::{
    CommandOutcome, CommandRequest, CommandRunner, CreateSession, CreatedSession, DirectoryStore,
    SessionError, SessionRepository,
};

#[derive(Default)]
pub struct MockSessionRepository {
    pub sessions: Mutex<HashMap<SessionId, TerminalSize>>,
    pub writes: Mutex<Vec<(SessionId, Vec<u8>)>>,
    pub created: Mutex<Vec<CreateSession>>,
    pub fail_create: Mutex<Option<String>>,
}

impl MockSessionRepository {
    pub fn with_session(id: &str) -> Self {
        let repo = Self::default();
        repo.sessions
            .lock()
            .unwrap()
            .insert(SessionId::try_new(id).unwrap(), TerminalSize::INITIAL);
        repo
    }

    pub fn written(&self) -> Vec<(SessionId, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }
}

impl SessionRepository for MockSessionRepository {
    fn create(&self, request: CreateSession) -> Result<CreatedSession, SessionError> {
        if let Some(reason) = self.fail_create.lock().unwrap().clone() {
            return Err(SessionError::Terminal {
                operation: "spawn",
                reason,
                code: crate::common::error_codes::SPAWN_FAILED,
            });
        }
        self.sessions
            .lock()
            .unwrap()
            .insert(request.id.clone(), TerminalSize::INITIAL);
        let created = CreatedSession {
            id: request.id.clone(),
            cwd: request.cwd.to_string_lossy().into_owned(),
            pid: Some(4242),
        };
        self.created.lock().unwrap().push(request);
        Ok(created)
    }

    fn remove(&self, id: &SessionId) -> bool {
        self.sessions.lock().unwrap().remove(id);
        true
    }

    fn write(&self, id: &SessionId, data: &[u8]) -> Result<(), SessionError> {
        if !self.sessions.lock().unwrap().contains_key(id) {
            return Err(SessionError::NotFound(id.clone()));
        }
        self.writes.lock().unwrap().push((id.clone(), data.to_vec()));
        Ok(())
    }

    fn resize(&self, id: &SessionId, size: TerminalSize) -> Result<(), SessionError> {
        match self.sessions.lock().unwrap().get_mut(id) {
            Some(current) => {
                *current = size;
                Ok(())
            }
            None => Err(SessionError::NotFound(id.clone())),
        }
    }

    fn info(&self, id: &SessionId) -> Result<SessionInfo, SessionError> {
        let sessions = self.sessions.lock().unwrap();
        let size = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        Ok(SessionInfo {
            id: id.clone(),
            pid: Some(4242),
            cols: size.cols(),
            rows: size.rows(),
            running: true,
            shell: "/bin/sh".to_string(),
            window: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        })
    }

    fn list(&self) -> Vec<SessionInfo> {
        let ids: Vec<SessionId> = self.sessions.lock().unwrap().keys().cloned().collect();
        ids.iter().filter_map(|id| self.info(id).ok()).collect()
    }

    fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn shutdown_all(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let count = sessions.len();
        sessions.clear();
        count
    }
}

#[derive(Default)]
pub struct MemoryDirectories {
    entries: Mutex<Vec<(SessionId, String, Option<String>)>>,
}

impl MemoryDirectories {
    pub fn with(id: &str, cwd: &str) -> Self {
        let store = Self::default();
        store.change(&SessionId::try_new(id).unwrap(), cwd.to_string());
        store.entries.lock().unwrap()[0].2 = None;
        store
    }
}

impl DirectoryStore for MemoryDirectories {
    fn current(&self, id: &SessionId) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|e| &e.0 == id).map(|e| e.1.clone())
    }

    fn previous(&self, id: &SessionId) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries.iter().find(|e| &e.0 == id).and_then(|e| e.2.clone())
    }

    fn change(&self, id: &SessionId, cwd: String) {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| &e.0 == id) {
            Some(entry) => {
                let old = std::mem::replace(&mut entry.1, cwd);
                entry.2 = Some(old);
            }
            None => entries.push((id.clone(), cwd, None)),
        }
    }

    fn entries(&self) -> Vec<(SessionId, String)> {
        let entries = self.entries.lock().unwrap();
        entries.iter().map(|e| (e.0.clone(), e.1.clone())).collect()
    }
}

/// Returns a fixed outcome and remembers what it was asked to run.
pub struct RecordingRunner {
    outcome: CommandOutcome,
    pub calls: Mutex<Vec<(String, PathBuf, Duration)>>,
}

impl RecordingRunner {
    pub fn returning(outcome: CommandOutcome) -> Self {
        Self {
            outcome,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, request: CommandRequest<'_>) -> CommandOutcome {
        self.calls.lock().unwrap().push((
            request.command.to_string(),
            request.cwd.to_path_buf(),
            request.timeout,
        ));
        self.outcome.clone()
    }
}

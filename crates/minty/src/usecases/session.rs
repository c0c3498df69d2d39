use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{
    SessionId, SessionInfo, SignalKind, TerminalSize, WindowId, resolve_cd_target,
    suggested_title,
};
use crate::usecases::ports::{CreateSession, DirectoryStore, SessionError, SessionRepository};

#[derive(Debug, Clone, Default)]
pub struct CreateSessionInput {
    pub session_id: Option<SessionId>,
    pub cwd: Option<String>,
    pub owner: Option<WindowId>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionOutput {
    pub session_id: SessionId,
    pub cwd: String,
    pub title: String,
    pub pid: Option<u32>,
}

pub trait CreateSessionUseCase: Send + Sync {
    fn execute(&self, input: CreateSessionInput) -> Result<CreateSessionOutput, SessionError>;
}

pub struct CreateSessionUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
    home: PathBuf,
}

impl<R: SessionRepository> CreateSessionUseCaseImpl<R> {
    pub fn new(repository: Arc<R>, home: PathBuf) -> Self {
        Self { repository, home }
    }

    /// `None`, `~` and `~/x` are relative to home; other relative paths too.
    fn resolve_cwd(&self, cwd: Option<&str>) -> PathBuf {
        match cwd.map(str::trim).filter(|c| !c.is_empty()) {
            Some(dir) => resolve_cd_target(dir, &self.home, None, &self.home),
            None => self.home.clone(),
        }
    }
}

impl<R: SessionRepository> CreateSessionUseCase for CreateSessionUseCaseImpl<R> {
    #[tracing::instrument(
        skip(self, input),
        fields(session = ?input.session_id, cwd = ?input.cwd, window = ?input.owner)
    )]
    fn execute(&self, input: CreateSessionInput) -> Result<CreateSessionOutput, SessionError> {
        let id = input.session_id.unwrap_or_else(SessionId::generate);
        let cwd = self.resolve_cwd(input.cwd.as_deref());
        let cwd_str = cwd.to_string_lossy().into_owned();
        let title = input
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| suggested_title(&cwd_str, &self.home.to_string_lossy()));

        let created = self.repository.create(CreateSession {
            id,
            cwd,
            owner: input.owner,
            title: title.clone(),
        })?;

        Ok(CreateSessionOutput {
            session_id: created.id,
            cwd: created.cwd,
            title,
            pid: created.pid,
        })
    }
}

pub trait RemoveSessionUseCase: Send + Sync {
    fn execute(&self, session_id: &SessionId) -> bool;
}

pub struct RemoveSessionUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
}

impl<R: SessionRepository> RemoveSessionUseCaseImpl<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R: SessionRepository> RemoveSessionUseCase for RemoveSessionUseCaseImpl<R> {
    #[tracing::instrument(skip(self), fields(session = %session_id))]
    fn execute(&self, session_id: &SessionId) -> bool {
        self.repository.remove(session_id)
    }
}

#[derive(Debug, Clone)]
pub struct WriteInput {
    pub session_id: SessionId,
    pub data: Vec<u8>,
    pub newline: bool,
}

pub trait WriteUseCase: Send + Sync {
    fn execute(&self, input: WriteInput) -> Result<(), SessionError>;
}

pub struct WriteUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
}

impl<R: SessionRepository> WriteUseCaseImpl<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R: SessionRepository> WriteUseCase for WriteUseCaseImpl<R> {
    #[tracing::instrument(
        skip(self, input),
        fields(session = %input.session_id, len = input.data.len(), newline = input.newline)
    )]
    fn execute(&self, mut input: WriteInput) -> Result<(), SessionError> {
        if input.newline {
            input.data.push(b'\n');
        }
        self.repository.write(&input.session_id, &input.data)
    }
}

#[derive(Debug, Clone)]
pub struct ResizeInput {
    pub session_id: SessionId,
    pub cols: u16,
    pub rows: u16,
}

pub trait ResizeUseCase: Send + Sync {
    fn execute(&self, input: ResizeInput) -> Result<TerminalSize, SessionError>;
}

pub struct ResizeUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
}

impl<R: SessionRepository> ResizeUseCaseImpl<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R: SessionRepository> ResizeUseCase for ResizeUseCaseImpl<R> {
    #[tracing::instrument(skip(self, input), fields(session = %input.session_id, cols = input.cols, rows = input.rows))]
    fn execute(&self, input: ResizeInput) -> Result<TerminalSize, SessionError> {
        let size = TerminalSize::try_new(input.cols, input.rows)?;
        self.repository.resize(&input.session_id, size)?;
        Ok(size)
    }
}

pub trait SignalUseCase: Send + Sync {
    fn execute(&self, session_id: &SessionId, kind: SignalKind) -> Result<(), SessionError>;
}

pub struct SignalUseCaseImpl<R: SessionRepository> {
    repository: Arc<R>,
}

impl<R: SessionRepository> SignalUseCaseImpl<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

impl<R: SessionRepository> SignalUseCase for SignalUseCaseImpl<R> {
    #[tracing::instrument(skip(self), fields(session = %session_id, signal = %kind))]
    fn execute(&self, session_id: &SessionId, kind: SignalKind) -> Result<(), SessionError> {
        self.repository.write(session_id, &[kind.control_byte()])
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfoOutput {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub cwd: Option<String>,
}

pub trait SessionInfoUseCase: Send + Sync {
    fn execute(&self, session_id: &SessionId) -> Result<SessionInfoOutput, SessionError>;
}

pub struct SessionInfoUseCaseImpl<R: SessionRepository, D: DirectoryStore> {
    repository: Arc<R>,
    directories: Arc<D>,
}

impl<R: SessionRepository, D: DirectoryStore> SessionInfoUseCaseImpl<R, D> {
    pub fn new(repository: Arc<R>, directories: Arc<D>) -> Self {
        Self {
            repository,
            directories,
        }
    }
}

impl<R: SessionRepository, D: DirectoryStore> SessionInfoUseCase for SessionInfoUseCaseImpl<R, D> {
    fn execute(&self, session_id: &SessionId) -> Result<SessionInfoOutput, SessionError> {
        let info = self.repository.info(session_id)?;
        Ok(SessionInfoOutput {
            cwd: self.directories.current(session_id),
            info,
        })
    }
}

/// One entry of the tab enumeration used for external persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub cwd: String,
    pub pid: Option<u32>,
    pub running: bool,
    pub window: Option<WindowId>,
}

pub trait SessionsUseCase: Send + Sync {
    fn execute(&self) -> Vec<SessionSummary>;
}

pub struct SessionsUseCaseImpl<R: SessionRepository, D: DirectoryStore> {
    repository: Arc<R>,
    directories: Arc<D>,
    home: PathBuf,
}

impl<R: SessionRepository, D: DirectoryStore> SessionsUseCaseImpl<R, D> {
    pub fn new(repository: Arc<R>, directories: Arc<D>, home: PathBuf) -> Self {
        Self {
            repository,
            directories,
            home,
        }
    }

    fn summary(&self, id: SessionId, cwd: String, live: Option<&SessionInfo>) -> SessionSummary {
        SessionSummary {
            title: suggested_title(&cwd, &self.home.to_string_lossy()),
            pid: live.and_then(|info| info.pid),
            running: live.is_some_and(|info| info.running),
            window: live.and_then(|info| info.window.clone()),
            id,
            cwd,
        }
    }
}

impl<R: SessionRepository, D: DirectoryStore> SessionsUseCase for SessionsUseCaseImpl<R, D> {
    #[tracing::instrument(skip(self))]
    fn execute(&self) -> Vec<SessionSummary> {
        let mut live: HashMap<SessionId, SessionInfo> = self
            .repository
            .list()
            .into_iter()
            .map(|info| (info.id.clone(), info))
            .collect();

        let mut summaries: Vec<SessionSummary> = self
            .directories
            .entries()
            .into_iter()
            .map(|(id, cwd)| {
                let info = live.remove(&id);
                self.summary(id, cwd, info.as_ref())
            })
            .collect();

        let home = self.home.to_string_lossy().into_owned();
        let mut untracked: Vec<SessionInfo> = live.into_values().collect();
        untracked.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries.extend(
            untracked
                .into_iter()
                .map(|info| self.summary(info.id.clone(), home.clone(), Some(&info))),
        );
        summaries
    }
}

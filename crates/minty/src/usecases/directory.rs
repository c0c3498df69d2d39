use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::SessionId;
use crate::usecases::ports::DirectoryStore;

pub trait TrackedDirUseCase: Send + Sync {
    /// Tracked directory, or home when the session is unknown.
    fn get(&self, session_id: &SessionId) -> String;
    /// Explicit external set. Stored as given.
    fn set(&self, session_id: &SessionId, cwd: String) -> String;
}

pub struct TrackedDirUseCaseImpl<D: DirectoryStore> {
    directories: Arc<D>,
    home: PathBuf,
}

impl<D: DirectoryStore> TrackedDirUseCaseImpl<D> {
    pub fn new(directories: Arc<D>, home: PathBuf) -> Self {
        Self { directories, home }
    }
}

impl<D: DirectoryStore> TrackedDirUseCase for TrackedDirUseCaseImpl<D> {
    fn get(&self, session_id: &SessionId) -> String {
        self.directories
            .current(session_id)
            .unwrap_or_else(|| self.home.to_string_lossy().into_owned())
    }

    #[tracing::instrument(skip(self), fields(session = %session_id))]
    fn set(&self, session_id: &SessionId, cwd: String) -> String {
        self.directories.change(session_id, cwd.clone());
        cwd
    }
}

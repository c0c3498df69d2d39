use crate::domain::SessionId;

/// Tracked working directory per session.
///
/// Only two writers exist: session creation and an explicit change
/// (`cd` interception or a client `cwd_set`). Nothing here ever looks at
/// the OS process.
pub trait DirectoryStore: Send + Sync {
    fn current(&self, id: &SessionId) -> Option<String>;
    fn previous(&self, id: &SessionId) -> Option<String>;
    /// Records a new directory, remembering the old one for `cd -`.
    fn change(&self, id: &SessionId, cwd: String);
    /// Tracked sessions in creation order.
    fn entries(&self) -> Vec<(SessionId, String)>;
}

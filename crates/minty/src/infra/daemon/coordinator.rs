//! Window lifecycle and the daemon's process-teardown hook.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::output_router::OutputRouter;
use super::windows::{WindowError, WindowKind, WindowRegistry, WindowSummary};
use crate::domain::{PushEvent, SessionId, TabDescriptor, WindowId};
use crate::usecases::ports::{SessionError, SessionRepository};

pub const DEFAULT_WINDOW_TITLE: &str = "Minty";

#[derive(Debug, Clone, Default)]
pub struct WindowRequest {
    pub title: Option<String>,
    pub tabs: Vec<TabDescriptor>,
    pub observe: Option<SessionId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowListing {
    #[serde(flatten)]
    pub summary: WindowSummary,
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    pub last_surface: bool,
    pub sessions_terminated: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl CoordinatorError {
    pub fn code(&self) -> i32 {
        match self {
            CoordinatorError::Window(e) => e.code(),
            CoordinatorError::Session(e) => e.code(),
        }
    }
}

pub struct WindowCoordinator<R: SessionRepository> {
    windows: Arc<WindowRegistry>,
    router: Arc<OutputRouter>,
    sessions: Arc<R>,
    keep_sessions: bool,
}

impl<R: SessionRepository> WindowCoordinator<R> {
    pub fn new(router: Arc<OutputRouter>, sessions: Arc<R>, keep_sessions: bool) -> Self {
        Self {
            windows: Arc::clone(router.windows()),
            router,
            sessions,
            keep_sessions,
        }
    }

    pub fn windows(&self) -> &Arc<WindowRegistry> {
        &self.windows
    }

    /// Registers a window. A saved tab set is queued as the window's first
    /// event so the surface can restore it as soon as it subscribes.
    #[tracing::instrument(skip(self, request), fields(tabs = request.tabs.len(), observe = ?request.observe))]
    pub fn create_window(&self, request: WindowRequest) -> Result<WindowId, CoordinatorError> {
        let kind = match request.observe {
            Some(session) => {
                self.sessions.info(&session)?;
                WindowKind::Observer { session }
            }
            None => WindowKind::Surface,
        };
        let title = request
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string());
        let id = self.windows.create(title, kind);
        if !request.tabs.is_empty() {
            self.windows
                .send(&id, PushEvent::TabsLoaded { tabs: request.tabs });
        }
        Ok(id)
    }

    /// Destroys a window. Closing the last surface terminates every session
    /// unless sessions are configured to outlive their windows.
    #[tracing::instrument(skip(self), fields(window_id = %id))]
    pub fn close_window(&self, id: &WindowId) -> Result<CloseOutcome, CoordinatorError> {
        let kind = self
            .windows
            .close(id)
            .ok_or_else(|| WindowError::NotFound(id.clone()))?;

        let last_surface = kind == WindowKind::Surface && self.windows.surface_count() == 0;
        let sessions_terminated = if last_surface && !self.keep_sessions {
            let count = self.sessions.shutdown_all();
            info!(count, "Last window closed; sessions terminated");
            count
        } else {
            0
        };
        Ok(CloseOutcome {
            last_surface,
            sessions_terminated,
        })
    }

    pub fn list(&self) -> Vec<WindowListing> {
        self.windows
            .list()
            .into_iter()
            .map(|summary| WindowListing {
                sessions: self.router.sessions_owned_by(&summary.window_id),
                summary,
            })
            .collect()
    }

    /// Shutdown hook: after this returns no session process is left.
    pub fn shutdown(&self) -> usize {
        let closed = self.windows.close_all();
        let terminated = self.sessions.shutdown_all();
        info!(windows = closed, sessions = terminated, "Coordinator shut down");
        terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::ports::test_support::MockSessionRepository;

    fn coordinator(keep: bool) -> (WindowCoordinator<MockSessionRepository>, Arc<MockSessionRepository>) {
        let windows = Arc::new(WindowRegistry::new(16));
        let router = Arc::new(OutputRouter::new(windows));
        let repo = Arc::new(MockSessionRepository::with_session("s1"));
        (
            WindowCoordinator::new(router, Arc::clone(&repo), keep),
            repo,
        )
    }

    #[test]
    fn test_tabs_are_queued_first() {
        let (coord, _) = coordinator(false);
        let tabs = vec![TabDescriptor {
            id: "1".into(),
            title: "~".into(),
            cwd: "/home/u".into(),
        }];
        let id = coord
            .create_window(WindowRequest {
                tabs: tabs.clone(),
                ..Default::default()
            })
            .unwrap();

        let rx = coord.windows().attach(&id).unwrap();
        assert_eq!(rx.try_recv().unwrap(), PushEvent::TabsLoaded { tabs });
        assert_eq!(coord.list()[0].summary.title, DEFAULT_WINDOW_TITLE);
    }

    #[test]
    fn test_closing_last_surface_terminates_sessions() {
        let (coord, repo) = coordinator(false);
        let a = coord.create_window(WindowRequest::default()).unwrap();
        let b = coord.create_window(WindowRequest::default()).unwrap();

        let first = coord.close_window(&a).unwrap();
        assert!(!first.last_surface);
        assert_eq!(repo.session_count(), 1);

        let second = coord.close_window(&b).unwrap();
        assert!(second.last_surface);
        assert_eq!(second.sessions_terminated, 1);
        assert_eq!(repo.session_count(), 0);
    }

    #[test]
    fn test_keep_sessions_and_observers() {
        let (coord, repo) = coordinator(true);
        let surface = coord.create_window(WindowRequest::default()).unwrap();
        let observer = coord
            .create_window(WindowRequest {
                observe: Some(SessionId::try_new("s1").unwrap()),
                ..Default::default()
            })
            .unwrap();

        assert!(!coord.close_window(&observer).unwrap().last_surface);
        assert!(coord.close_window(&surface).unwrap().last_surface);
        assert_eq!(repo.session_count(), 1);
    }

    #[test]
    fn test_observer_of_unknown_session_is_rejected() {
        let (coord, _) = coordinator(false);
        let err = coord
            .create_window(WindowRequest {
                observe: Some(SessionId::try_new("ghost").unwrap()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Session(SessionError::NotFound(_))));
    }

    #[test]
    fn test_close_unknown_window() {
        let (coord, _) = coordinator(false);
        let err = coord.close_window(&WindowId::generate()).unwrap_err();
        assert!(matches!(err, CoordinatorError::Window(WindowError::NotFound(_))));
    }

    #[test]
    fn test_shutdown_terminates_everything() {
        let (coord, repo) = coordinator(true);
        coord.create_window(WindowRequest::default()).unwrap();
        assert_eq!(coord.shutdown(), 1);
        assert!(coord.windows().is_empty());
        assert_eq!(repo.session_count(), 0);
    }
}

//! Session -> window dispatch table.
//!
//! Each live session has one route entry stamped with the generation of the
//! process that owns it. Events from an older generation, or for a session
//! that has no route at all, are dropped; that is how late output from a
//! removed or replaced shell never reaches a surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use tracing::trace;

use super::windows::{Delivery, WindowRegistry};
use crate::common::{rwlock_read_or_recover, rwlock_write_or_recover};
use crate::domain::{PushEvent, SessionId, WindowId};

#[derive(Debug, Clone)]
struct Route {
    generation: u64,
    owner: Option<WindowId>,
}

pub struct OutputRouter {
    windows: Arc<WindowRegistry>,
    routes: RwLock<HashMap<SessionId, Route>>,
}

impl OutputRouter {
    pub fn new(windows: Arc<WindowRegistry>) -> Self {
        Self {
            windows,
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub fn windows(&self) -> &Arc<WindowRegistry> {
        &self.windows
    }

    pub fn register(&self, session: &SessionId, generation: u64, owner: Option<WindowId>) {
        rwlock_write_or_recover(&self.routes).insert(session.clone(), Route { generation, owner });
    }

    /// Drops the route only if it still belongs to `generation`.
    pub fn unregister(&self, session: &SessionId, generation: u64) -> bool {
        let mut routes = rwlock_write_or_recover(&self.routes);
        match routes.get(session) {
            Some(route) if route.generation == generation => {
                routes.remove(session);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self) {
        rwlock_write_or_recover(&self.routes).clear();
    }

    pub fn sessions_owned_by(&self, window: &WindowId) -> usize {
        rwlock_read_or_recover(&self.routes)
            .values()
            .filter(|route| route.owner.as_ref() == Some(window))
            .count()
    }

    /// Delivers a session event to its owner (resolved now, not at
    /// registration) and to any observers of that session.
    pub fn route(&self, session: &SessionId, generation: u64, event: PushEvent) {
        let owner = {
            let routes = rwlock_read_or_recover(&self.routes);
            match routes.get(session) {
                Some(route) if route.generation == generation => route.owner.clone(),
                _ => {
                    trace!(session_id = %session, generation, event = event.name(), "No live route; dropping event");
                    return;
                }
            }
        };
        self.deliver(session, owner, event);
    }

    /// Sends an event that is not tied to a route generation, such as the
    /// creation notice for a session that was just registered.
    pub fn notify(&self, session: &SessionId, owner: Option<WindowId>, event: PushEvent) {
        self.deliver(session, owner, event);
    }

    fn deliver(&self, session: &SessionId, owner: Option<WindowId>, event: PushEvent) {
        let target = match owner {
            Some(window) => Some(window),
            None => self.windows.primary(),
        };

        for observer in self.windows.observers_of(session) {
            self.windows.send(&observer, event.clone());
        }

        let Some(target) = target else {
            trace!(session_id = %session, event = event.name(), "No display surface; dropping event");
            return;
        };
        if self.windows.send(&target, event) == Delivery::Gone {
            trace!(session_id = %session, window_id = %target, "Owning window is gone; event dropped");
        }
    }
}

//! Authoritative per-session working directory.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::common::{rwlock_read_or_recover, rwlock_write_or_recover};
use crate::domain::SessionId;
use crate::usecases::ports::DirectoryStore;

#[derive(Debug, Clone)]
struct Tracked {
    current: String,
    previous: Option<String>,
    order: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SessionId, Tracked>,
    next_order: u64,
}

#[derive(Default)]
pub struct DirectoryTracker {
    inner: RwLock<Inner>,
}

impl DirectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a freshly created session. A re-created id keeps its
    /// position but loses its `cd -` history.
    pub fn init(&self, id: &SessionId, cwd: String) {
        let mut inner = rwlock_write_or_recover(&self.inner);
        let order = match inner.entries.get(id) {
            Some(existing) => existing.order,
            None => {
                inner.next_order += 1;
                inner.next_order
            }
        };
        inner.entries.insert(
            id.clone(),
            Tracked {
                current: cwd,
                previous: None,
                order,
            },
        );
    }

    pub fn remove(&self, id: &SessionId) -> bool {
        rwlock_write_or_recover(&self.inner)
            .entries
            .remove(id)
            .is_some()
    }

    pub fn clear(&self) {
        rwlock_write_or_recover(&self.inner).entries.clear();
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        rwlock_read_or_recover(&self.inner).entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        rwlock_read_or_recover(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DirectoryStore for DirectoryTracker {
    fn current(&self, id: &SessionId) -> Option<String> {
        rwlock_read_or_recover(&self.inner)
            .entries
            .get(id)
            .map(|t| t.current.clone())
    }

    fn previous(&self, id: &SessionId) -> Option<String> {
        rwlock_read_or_recover(&self.inner)
            .entries
            .get(id)
            .and_then(|t| t.previous.clone())
    }

    fn change(&self, id: &SessionId, cwd: String) {
        let mut inner = rwlock_write_or_recover(&self.inner);
        if let Some(tracked) = inner.entries.get_mut(id) {
            let old = std::mem::replace(&mut tracked.current, cwd);
            tracked.previous = Some(old);
            return;
        }
        inner.next_order += 1;
        let order = inner.next_order;
        inner.entries.insert(
            id.clone(),
            Tracked {
                current: cwd,
                previous: None,
                order,
            },
        );
    }

    fn entries(&self) -> Vec<(SessionId, String)> {
        let inner = rwlock_read_or_recover(&self.inner);
        let mut entries: Vec<(&SessionId, &Tracked)> = inner.entries.iter().collect();
        entries.sort_by_key(|(_, t)| t.order);
        entries
            .into_iter()
            .map(|(id, t)| (id.clone(), t.current.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        SessionId::try_new(s).unwrap()
    }

    #[test]
    fn test_change_remembers_previous() {
        let tracker = DirectoryTracker::new();
        tracker.init(&id("a"), "/home/u".into());
        tracker.change(&id("a"), "/tmp".into());

        assert_eq!(tracker.current(&id("a")).as_deref(), Some("/tmp"));
        assert_eq!(tracker.previous(&id("a")).as_deref(), Some("/home/u"));
    }

    #[test]
    fn test_reinit_keeps_order_and_drops_history() {
        let tracker = DirectoryTracker::new();
        tracker.init(&id("a"), "/a".into());
        tracker.init(&id("b"), "/b".into());
        tracker.change(&id("a"), "/a2".into());
        tracker.init(&id("a"), "/a3".into());

        let ids: Vec<String> = tracker.entries().into_iter().map(|(i, _)| i.to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(tracker.previous(&id("a")), None);
    }

    #[test]
    fn test_remove_and_clear() {
        let tracker = DirectoryTracker::new();
        tracker.init(&id("a"), "/a".into());
        assert!(tracker.remove(&id("a")));
        assert!(!tracker.remove(&id("a")));
        tracker.change(&id("b"), "/b".into());
        tracker.clear();
        assert!(tracker.is_empty());
    }
}

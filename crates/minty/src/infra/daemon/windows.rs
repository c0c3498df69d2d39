//! Registry of display surfaces.
//!
//! A window is nothing more than a bounded event queue plus a little
//! metadata. Whoever subscribes to the window drains the queue; dropping the
//! window drops the sender, which ends that subscription.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crossbeam_channel as channel;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::error_codes;
use crate::common::{mutex_lock_or_recover, rwlock_read_or_recover, rwlock_write_or_recover};
use crate::domain::{PushEvent, SessionId, WindowId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowKind {
    /// A real display surface. Can own sessions and counts toward the
    /// "all windows closed" teardown.
    Surface,
    /// Follows a single session's output; never owns anything.
    Observer { session: SessionId },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window not found: {0}")]
    NotFound(WindowId),
    #[error("Window {0} already has a subscriber")]
    AlreadyAttached(WindowId),
}

impl WindowError {
    pub fn code(&self) -> i32 {
        match self {
            WindowError::NotFound(_) => error_codes::WINDOW_NOT_FOUND,
            WindowError::AlreadyAttached(_) => error_codes::WINDOW_ATTACHED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    QueueFull,
    Gone,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowSummary {
    pub window_id: WindowId,
    pub title: String,
    pub observer: bool,
    pub attached: bool,
    pub dropped_events: u64,
}

struct Window {
    title: String,
    kind: WindowKind,
    order: u64,
    tx: channel::Sender<PushEvent>,
    pending_rx: Mutex<Option<channel::Receiver<PushEvent>>>,
    dropped: AtomicU64,
}

pub struct WindowRegistry {
    windows: RwLock<HashMap<WindowId, Arc<Window>>>,
    next_order: AtomicU64,
    queue_capacity: usize,
}

impl WindowRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            next_order: AtomicU64::new(0),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn create(&self, title: String, kind: WindowKind) -> WindowId {
        let id = WindowId::generate();
        let (tx, rx) = channel::bounded(self.queue_capacity);
        let window = Window {
            title,
            kind,
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            tx,
            pending_rx: Mutex::new(Some(rx)),
            dropped: AtomicU64::new(0),
        };
        rwlock_write_or_recover(&self.windows).insert(id.clone(), Arc::new(window));
        debug!(window_id = %id, "Window registered");
        id
    }

    /// Hands out the window's event receiver. Only one subscriber per window.
    pub fn attach(&self, id: &WindowId) -> Result<channel::Receiver<PushEvent>, WindowError> {
        let window = self
            .get(id)
            .ok_or_else(|| WindowError::NotFound(id.clone()))?;
        mutex_lock_or_recover(&window.pending_rx)
            .take()
            .ok_or_else(|| WindowError::AlreadyAttached(id.clone()))
    }

    /// Removes the window and returns its kind if it existed.
    pub fn close(&self, id: &WindowId) -> Option<WindowKind> {
        let removed = rwlock_write_or_recover(&self.windows).remove(id);
        removed.map(|window| {
            debug!(window_id = %id, "Window closed");
            window.kind.clone()
        })
    }

    pub fn close_all(&self) -> usize {
        let mut windows = rwlock_write_or_recover(&self.windows);
        let count = windows.len();
        windows.clear();
        count
    }

    pub fn contains(&self, id: &WindowId) -> bool {
        rwlock_read_or_recover(&self.windows).contains_key(id)
    }

    pub fn kind(&self, id: &WindowId) -> Option<WindowKind> {
        self.get(id).map(|window| window.kind.clone())
    }

    /// Never blocks: a full queue drops the event and counts it.
    pub fn send(&self, id: &WindowId, event: PushEvent) -> Delivery {
        let Some(window) = self.get(id) else {
            return Delivery::Gone;
        };
        match window.tx.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(channel::TrySendError::Full(event)) => {
                let dropped = window.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped.is_power_of_two() {
                    warn!(window_id = %id, event = event.name(), dropped, "Window queue full; dropping event");
                }
                Delivery::QueueFull
            }
            Err(channel::TrySendError::Disconnected(_)) => Delivery::Gone,
        }
    }

    /// Oldest live surface; the target for sessions with no owner.
    pub fn primary(&self) -> Option<WindowId> {
        rwlock_read_or_recover(&self.windows)
            .iter()
            .filter(|(_, w)| w.kind == WindowKind::Surface)
            .min_by_key(|(_, w)| w.order)
            .map(|(id, _)| id.clone())
    }

    pub fn observers_of(&self, session: &SessionId) -> Vec<WindowId> {
        rwlock_read_or_recover(&self.windows)
            .iter()
            .filter(|(_, w)| matches!(&w.kind, WindowKind::Observer { session: s } if s == session))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn surface_count(&self) -> usize {
        rwlock_read_or_recover(&self.windows)
            .values()
            .filter(|w| w.kind == WindowKind::Surface)
            .count()
    }

    pub fn len(&self) -> usize {
        rwlock_read_or_recover(&self.windows).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<WindowSummary> {
        let windows = rwlock_read_or_recover(&self.windows);
        let mut entries: Vec<(&WindowId, &Arc<Window>)> = windows.iter().collect();
        entries.sort_by_key(|(_, w)| w.order);
        entries
            .into_iter()
            .map(|(id, w)| WindowSummary {
                window_id: id.clone(),
                title: w.title.clone(),
                observer: matches!(w.kind, WindowKind::Observer { .. }),
                attached: mutex_lock_or_recover(&w.pending_rx).is_none(),
                dropped_events: w.dropped.load(Ordering::Relaxed),
            })
            .collect()
    }

    fn get(&self, id: &WindowId) -> Option<Arc<Window>> {
        rwlock_read_or_recover(&self.windows).get(id).cloned()
    }
}

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use super::SessionId;

/// One tab as persisted by the UI and replayed into a new window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabDescriptor {
    pub id: String,
    pub title: String,
    pub cwd: String,
}

/// Events pushed from the daemon to display surfaces.
///
/// `Output` carries the PTY bytes exactly as read: no line buffering,
/// no UTF-8 validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Output {
        session_id: SessionId,
        data: Bytes,
    },
    Exit {
        session_id: SessionId,
        exit_code: i32,
    },
    SessionCreated {
        session_id: SessionId,
        cwd: String,
        title: String,
    },
    TabsLoaded {
        tabs: Vec<TabDescriptor>,
    },
}

impl PushEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Output { .. } => "output",
            PushEvent::Exit { .. } => "exit",
            PushEvent::SessionCreated { .. } => "session_created",
            PushEvent::TabsLoaded { .. } => "tabs_loaded",
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            PushEvent::Output { session_id, .. }
            | PushEvent::Exit { session_id, .. }
            | PushEvent::SessionCreated { session_id, .. } => Some(session_id),
            PushEvent::TabsLoaded { .. } => None,
        }
    }
}

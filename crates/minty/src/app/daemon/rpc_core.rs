//! Streaming `subscribe` calls: one window's events as response frames.

use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::transport::DaemonConnection;
use crate::adapters::daemon::DomainError;
use crate::adapters::{RpcRequest, RpcResponse, optional_window_id, push_event_to_json};
use crate::domain::WindowId;
use crate::infra::daemon::{WindowCoordinator, WindowRequest};
use crate::usecases::ports::SessionRepository;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const POLL_TICK: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Rejected,
    ClientGone,
    WindowClosed,
}

/// Serves `subscribe` until the client hangs up or the window goes away.
/// A hang-up destroys the window.
pub fn serve_subscription<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    conn: &mut DaemonConnection,
    request: RpcRequest,
    heartbeat: Duration,
) -> StreamEnd {
    let id = request.id;
    let window = match resolve_window(coordinator, &request) {
        Ok(window) => window,
        Err(response) => {
            let _ = conn.write_response(&response);
            return StreamEnd::Rejected;
        }
    };
    let rx = match coordinator.windows().attach(&window) {
        Ok(rx) => rx,
        Err(e) => {
            let _ = conn.write_response(&DomainError::from(e).into_response(id));
            return StreamEnd::Rejected;
        }
    };
    let span = tracing::info_span!("subscribe", request_id = id, window_id = %window);
    let _enter = span.enter();
    info!("Window subscribed");

    if !send_frame(conn, id, json!({ "event": "ready", "window_id": window })) {
        return drop_window(coordinator, &window);
    }

    let tick = POLL_TICK.min(heartbeat);
    let mut last_frame = Instant::now();
    loop {
        match rx.recv_timeout(tick) {
            Ok(event) => {
                if !send_frame(conn, id, push_event_to_json(&event)) {
                    return drop_window(coordinator, &window);
                }
                last_frame = Instant::now();
            }
            Err(RecvTimeoutError::Timeout) => {
                if conn.peer_closed() {
                    return drop_window(coordinator, &window);
                }
                if last_frame.elapsed() >= heartbeat {
                    if !send_frame(conn, id, json!({ "event": "heartbeat" })) {
                        return drop_window(coordinator, &window);
                    }
                    last_frame = Instant::now();
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = send_frame(conn, id, json!({ "event": "closed", "window_id": window }));
                info!("Window closed; stream finished");
                return StreamEnd::WindowClosed;
            }
        }
    }
}

#[allow(clippy::result_large_err)]
fn resolve_window<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    request: &RpcRequest,
) -> Result<WindowId, RpcResponse> {
    if let Some(window) = optional_window_id(request, "window")? {
        return Ok(window);
    }
    coordinator
        .create_window(WindowRequest {
            title: request.param_str("title").map(String::from),
            ..Default::default()
        })
        .map_err(|e| DomainError::from(e).into_response(request.id))
}

fn send_frame(conn: &mut DaemonConnection, id: u64, frame: Value) -> bool {
    conn.write_response(&RpcResponse::success(id, frame)).is_ok()
}

fn drop_window<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    window: &WindowId,
) -> StreamEnd {
    match coordinator.close_window(window) {
        Ok(outcome) => debug!(
            last_surface = outcome.last_surface,
            sessions_terminated = outcome.sessions_terminated,
            "Subscriber left; window destroyed"
        ),
        Err(e) => debug!(error = %e, "Subscriber left after its window was closed"),
    }
    StreamEnd::ClientGone
}

//! JSON-RPC wire types and conversions between request params, use case
//! inputs and response payloads.

mod types;

pub use types::{ErrorData, RpcRequest, RpcResponse, RpcServerError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use serde_json::json;

use crate::domain::{PushEvent, SessionId, SessionInfo, TabDescriptor, WindowId};
use crate::usecases::{
    CreateSessionInput, CreateSessionOutput, SessionInfoOutput, SessionSummary, WriteInput,
};

/// Failures that travel as values: `{success:false, error}`.
pub fn failure(error: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": error.to_string() })
}

#[allow(clippy::result_large_err)]
pub fn require_session_id(request: &RpcRequest) -> Result<SessionId, RpcResponse> {
    let raw = request.require_str("session")?;
    SessionId::try_new(raw).map_err(|e| RpcResponse::invalid_params(request.id, &e.to_string()))
}

#[allow(clippy::result_large_err)]
pub fn optional_session_id(request: &RpcRequest) -> Result<Option<SessionId>, RpcResponse> {
    match request.param_str("session").filter(|s| !s.trim().is_empty()) {
        Some(raw) => SessionId::try_new(raw)
            .map(Some)
            .map_err(|e| RpcResponse::invalid_params(request.id, &e.to_string())),
        None => Ok(None),
    }
}

#[allow(clippy::result_large_err)]
pub fn optional_window_id(request: &RpcRequest, key: &str) -> Result<Option<WindowId>, RpcResponse> {
    match request.param_str(key).filter(|s| !s.trim().is_empty()) {
        Some(raw) => WindowId::try_new(raw)
            .map(Some)
            .map_err(|e| RpcResponse::invalid_params(request.id, &e.to_string())),
        None => Ok(None),
    }
}

#[allow(clippy::result_large_err)]
pub fn parse_create_session_input(request: &RpcRequest) -> Result<CreateSessionInput, RpcResponse> {
    Ok(CreateSessionInput {
        session_id: optional_session_id(request)?,
        cwd: request.param_str("cwd").map(String::from),
        owner: optional_window_id(request, "window")?,
        title: request.param_str("title").map(String::from),
    })
}

pub fn create_output_to_json(output: CreateSessionOutput) -> Value {
    json!({
        "success": true,
        "session_id": output.session_id,
        "cwd": output.cwd,
        "title": output.title,
        "pid": output.pid,
    })
}

/// `data` is sent as-is; `data_base64` carries arbitrary bytes.
#[allow(clippy::result_large_err)]
pub fn parse_write_input(request: &RpcRequest, newline: bool) -> Result<WriteInput, RpcResponse> {
    let session_id = require_session_id(request)?;
    let data = if newline {
        request.require_str("command")?.as_bytes().to_vec()
    } else if let Some(text) = request.param_str("data") {
        text.as_bytes().to_vec()
    } else if let Some(encoded) = request.param_str("data_base64") {
        STANDARD.decode(encoded).map_err(|e| {
            RpcResponse::invalid_params(request.id, &format!("Invalid 'data_base64' param: {e}"))
        })?
    } else {
        return Err(RpcResponse::invalid_params(
            request.id,
            "Missing 'data' or 'data_base64' param",
        ));
    };
    Ok(WriteInput {
        session_id,
        data,
        newline,
    })
}

#[allow(clippy::result_large_err)]
pub fn parse_tabs(request: &RpcRequest) -> Result<Vec<TabDescriptor>, RpcResponse> {
    match request.param("tabs") {
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| RpcResponse::invalid_params(request.id, &format!("Invalid 'tabs' param: {e}"))),
        None => Ok(Vec::new()),
    }
}

pub fn session_info_to_json(output: SessionInfoOutput) -> Value {
    let SessionInfo {
        id,
        pid,
        cols,
        rows,
        running,
        window,
        ..
    } = output.info;
    json!({
        "success": true,
        "session_id": id,
        "pid": pid,
        "cols": cols,
        "rows": rows,
        "running": running,
        "cwd": output.cwd,
        "window": window,
    })
}

pub fn sessions_to_json(sessions: Vec<SessionSummary>) -> Value {
    let sessions: Vec<Value> = sessions
        .into_iter()
        .map(|s| {
            json!({
                "id": s.id,
                "title": s.title,
                "cwd": s.cwd,
                "pid": s.pid,
                "running": s.running,
                "window": s.window,
            })
        })
        .collect();
    json!({ "sessions": sessions })
}

/// Stream frame for one push event. Output bytes are base64 so escape
/// sequences and partial UTF-8 survive JSON.
pub fn push_event_to_json(event: &PushEvent) -> Value {
    match event {
        PushEvent::Output { session_id, data } => json!({
            "event": event.name(),
            "session_id": session_id,
            "data": STANDARD.encode(data),
        }),
        PushEvent::Exit {
            session_id,
            exit_code,
        } => json!({
            "event": event.name(),
            "session_id": session_id,
            "exit_code": exit_code,
        }),
        PushEvent::SessionCreated {
            session_id,
            cwd,
            title,
        } => json!({
            "event": event.name(),
            "session_id": session_id,
            "cwd": cwd,
            "title": title,
        }),
        PushEvent::TabsLoaded { tabs } => json!({
            "event": event.name(),
            "tabs": tabs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(params: Value) -> RpcRequest {
        RpcRequest::new(3, "session_write", Some(params))
    }

    #[test]
    fn test_write_accepts_text_or_base64() {
        let text = parse_write_input(&request(json!({"session": "t1", "data": "ls\r"})), false).unwrap();
        assert_eq!(text.data, b"ls\r");

        let raw = parse_write_input(
            &request(json!({"session": "t1", "data_base64": STANDARD.encode([0x1b, 0xff])})),
            false,
        )
        .unwrap();
        assert_eq!(raw.data, vec![0x1b, 0xff]);
    }

    #[test]
    fn test_write_requires_payload_and_session() {
        assert!(parse_write_input(&request(json!({"session": "t1"})), false).is_err());
        assert!(parse_write_input(&request(json!({"data": "x"})), false).is_err());
        assert!(parse_write_input(&request(json!({"session": "t1", "data_base64": "%%"})), false).is_err());
    }

    #[test]
    fn test_write_line_uses_command() {
        let input = parse_write_input(&request(json!({"session": "t1", "command": "pwd"})), true).unwrap();
        assert!(input.newline);
        assert_eq!(input.data, b"pwd");
    }

    #[test]
    fn test_output_event_is_base64() {
        let event = PushEvent::Output {
            session_id: SessionId::try_new("t1").unwrap(),
            data: Bytes::from_static(b"\x1b[31mhi"),
        };
        let json = push_event_to_json(&event);
        assert_eq!(json["event"], "output");
        assert_eq!(json["session_id"], "t1");
        assert_eq!(STANDARD.decode(json["data"].as_str().unwrap()).unwrap(), b"\x1b[31mhi");
    }

    #[test]
    fn test_blank_optional_ids_are_absent() {
        let req = request(json!({"session": " ", "window": ""}));
        assert_eq!(optional_session_id(&req).unwrap(), None);
        assert_eq!(optional_window_id(&req, "window").unwrap(), None);
    }

    #[test]
    fn test_failure_shape() {
        assert_eq!(
            failure("no active session"),
            json!({"success": false, "error": "no active session"})
        );
    }
}

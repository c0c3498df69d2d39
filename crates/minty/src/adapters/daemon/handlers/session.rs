//! Session handlers. Failures of the session itself travel as
//! `{success:false, error}` values; only malformed requests become
//! JSON-RPC errors.

use serde_json::json;

use super::common;
use crate::adapters::rpc::{
    RpcRequest, RpcResponse, create_output_to_json, failure, parse_create_session_input,
    parse_write_input, require_session_id, session_info_to_json, sessions_to_json,
};
use crate::domain::SignalKind;
use crate::infra::daemon::process_cwd;
use crate::usecases::{
    CreateSessionUseCase, RemoveSessionUseCase, ResizeInput, ResizeUseCase, SessionInfoUseCase,
    SessionsUseCase, SignalUseCase, WriteUseCase,
};

pub fn handle_create<U: CreateSessionUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_create").entered();
    let input = match parse_create_session_input(&request) {
        Ok(input) => input,
        Err(resp) => return resp,
    };
    let result = match usecase.execute(input) {
        Ok(output) => create_output_to_json(output),
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

pub fn handle_remove<U: RemoveSessionUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_remove").entered();
    match require_session_id(&request) {
        Ok(id) => RpcResponse::success(request.id, json!(usecase.execute(&id))),
        Err(resp) => resp,
    }
}

pub fn handle_write<U: WriteUseCase>(usecase: &U, request: RpcRequest, newline: bool) -> RpcResponse {
    let _span = common::handler_span(&request, "session_write").entered();
    let input = match parse_write_input(&request, newline) {
        Ok(input) => input,
        Err(resp) => return resp,
    };
    match usecase.execute(input) {
        Ok(()) => RpcResponse::action_success(request.id),
        Err(e) => RpcResponse::success(request.id, failure(e)),
    }
}

pub fn handle_resize<U: ResizeUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_resize").entered();
    let parsed = require_session_id(&request).and_then(|session_id| {
        Ok(ResizeInput {
            session_id,
            cols: request.require_u16("cols")?,
            rows: request.require_u16("rows")?,
        })
    });
    let input = match parsed {
        Ok(input) => input,
        Err(resp) => return resp,
    };
    match usecase.execute(input) {
        Ok(size) => RpcResponse::success(
            request.id,
            json!({ "success": true, "cols": size.cols(), "rows": size.rows() }),
        ),
        Err(e) => RpcResponse::success(request.id, failure(e)),
    }
}

pub fn handle_signal<U: SignalUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_signal").entered();
    let parsed = require_session_id(&request)
        .and_then(|id| request.require_str("signal").map(|raw| (id, raw.to_string())));
    let (session_id, raw) = match parsed {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };
    let kind = match raw.parse::<SignalKind>() {
        Ok(kind) => kind,
        Err(e) => return RpcResponse::success(request.id, failure(e)),
    };
    match usecase.execute(&session_id, kind) {
        Ok(()) => RpcResponse::action_success(request.id),
        Err(e) => RpcResponse::success(request.id, failure(e)),
    }
}

pub fn handle_info<U: SessionInfoUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_info").entered();
    let session_id = match require_session_id(&request) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = match usecase.execute(&session_id) {
        Ok(output) => session_info_to_json(output),
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

/// OS-level cwd of the session's shell. Read-only: the tracked directory
/// is left alone.
pub fn handle_os_cwd<U: SessionInfoUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "session_os_cwd").entered();
    let session_id = match require_session_id(&request) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = match usecase.execute(&session_id) {
        Ok(output) => match output.info.pid.and_then(process_cwd) {
            Some(cwd) => json!({ "success": true, "cwd": cwd.to_string_lossy() }),
            None => failure("working directory unavailable"),
        },
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

pub fn handle_sessions<U: SessionsUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "sessions").entered();
    RpcResponse::success(request.id, sessions_to_json(usecase.execute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionId, TerminalSize};
    use crate::usecases::ports::test_support::MockSessionRepository;
    use crate::usecases::{
        RemoveSessionUseCaseImpl, ResizeUseCaseImpl, SignalUseCaseImpl, WriteUseCaseImpl,
    };
    use serde_json::Value;
    use std::sync::Arc;

    fn call(params: Value) -> RpcRequest {
        RpcRequest::new(1, "test", Some(params))
    }

    fn result(resp: &RpcResponse) -> Value {
        resp.result().cloned().unwrap()
    }

    #[test]
    fn test_write_to_unknown_session_is_a_value() {
        let usecase = WriteUseCaseImpl::new(Arc::new(MockSessionRepository::default()));
        let resp = handle_write(&usecase, call(json!({"session": "t1", "data": "x"})), false);
        assert_eq!(
            result(&resp),
            json!({"success": false, "error": "no active session"})
        );
    }

    #[test]
    fn test_remove_is_always_true() {
        let usecase = RemoveSessionUseCaseImpl::new(Arc::new(MockSessionRepository::default()));
        let resp = handle_remove(&usecase, call(json!({"session": "ghost"})));
        assert_eq!(result(&resp), json!(true));
        let again = handle_remove(&usecase, call(json!({"session": "ghost"})));
        assert_eq!(result(&again), json!(true));
    }

    #[test]
    fn test_signal_writes_control_byte_and_rejects_unknown() {
        let repo = Arc::new(MockSessionRepository::with_session("t1"));
        let usecase = SignalUseCaseImpl::new(Arc::clone(&repo));

        let ok = handle_signal(&usecase, call(json!({"session": "t1", "signal": "EOF"})));
        assert_eq!(result(&ok)["success"], true);
        assert_eq!(repo.written()[0].1, vec![0x04]);

        let bad = handle_signal(&usecase, call(json!({"session": "t1", "signal": "SIGKILL"})));
        assert_eq!(result(&bad)["success"], false);
    }

    #[test]
    fn test_resize_reports_geometry_and_validates_params() {
        let repo = Arc::new(MockSessionRepository::with_session("t1"));
        let usecase = ResizeUseCaseImpl::new(Arc::clone(&repo));

        let ok = handle_resize(&usecase, call(json!({"session": "t1", "cols": 80, "rows": 24})));
        assert_eq!(result(&ok), json!({"success": true, "cols": 80, "rows": 24}));
        assert_eq!(
            repo.sessions.lock().unwrap()[&SessionId::try_new("t1").unwrap()],
            TerminalSize::try_new(80, 24).unwrap()
        );

        let bad = handle_resize(&usecase, call(json!({"session": "t1", "cols": 80})));
        assert!(!bad.is_success());
    }
}

use serde_json::json;

use super::common;
use crate::adapters::daemon::DomainError;
use crate::adapters::rpc::{
    RpcRequest, RpcResponse, optional_session_id, optional_window_id, parse_tabs,
};
use crate::infra::daemon::{WindowCoordinator, WindowRequest};
use crate::usecases::ports::SessionRepository;

#[allow(clippy::result_large_err)]
pub fn parse_window_request(request: &RpcRequest) -> Result<WindowRequest, RpcResponse> {
    let observe = if request.param_bool("observer", false) {
        match optional_session_id(request)? {
            Some(session) => Some(session),
            None => {
                return Err(RpcResponse::invalid_params(
                    request.id,
                    "Observer windows need a 'session' param",
                ));
            }
        }
    } else {
        None
    };
    Ok(WindowRequest {
        title: request.param_str("title").map(String::from),
        tabs: parse_tabs(request)?,
        observe,
    })
}

pub fn handle_window_create<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    request: RpcRequest,
) -> RpcResponse {
    let _span = common::handler_span(&request, "window_create").entered();
    let window_request = match parse_window_request(&request) {
        Ok(window_request) => window_request,
        Err(resp) => return resp,
    };
    match coordinator.create_window(window_request) {
        Ok(id) => RpcResponse::success(request.id, json!({ "success": true, "window_id": id })),
        Err(e) => DomainError::from(e).into_response(request.id),
    }
}

pub fn handle_window_close<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    request: RpcRequest,
) -> RpcResponse {
    let _span = common::handler_span(&request, "window_close").entered();
    let id = match optional_window_id(&request, "window") {
        Ok(Some(id)) => id,
        Ok(None) => return RpcResponse::invalid_params(request.id, "Missing 'window' param"),
        Err(resp) => return resp,
    };
    match coordinator.close_window(&id) {
        Ok(outcome) => RpcResponse::success(
            request.id,
            json!({
                "success": true,
                "last_surface": outcome.last_surface,
                "sessions_terminated": outcome.sessions_terminated,
            }),
        ),
        Err(e) => DomainError::from(e).into_response(request.id),
    }
}

pub fn handle_windows<R: SessionRepository>(
    coordinator: &WindowCoordinator<R>,
    request: RpcRequest,
) -> RpcResponse {
    RpcResponse::success(request.id, json!({ "windows": coordinator.list() }))
}

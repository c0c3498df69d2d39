use serde_json::json;

use super::common;
use crate::adapters::rpc::{RpcRequest, RpcResponse};
use crate::infra::daemon::SystemInfo;
use crate::usecases::{HealthUseCase, ShutdownUseCase};

pub fn handle_ping(request: RpcRequest) -> RpcResponse {
    RpcResponse::success(request.id, json!({ "pong": true }))
}

pub fn handle_health<U: HealthUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "health").entered();
    RpcResponse::success_json(request.id, &usecase.execute())
}

pub fn handle_shutdown<U: ShutdownUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "shutdown").entered();
    RpcResponse::success_json(request.id, &usecase.execute())
}

pub fn handle_system_info(info: &SystemInfo, request: RpcRequest) -> RpcResponse {
    RpcResponse::success_json(request.id, info)
}

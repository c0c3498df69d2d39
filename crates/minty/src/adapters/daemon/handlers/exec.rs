use serde_json::json;

use super::common;
use crate::adapters::daemon::ExecUseCases;
use crate::adapters::rpc::{RpcRequest, RpcResponse, optional_session_id, require_session_id};
use crate::usecases::ports::{CommandRunner, DirectoryStore};
use crate::usecases::{ExecuteInput, ExecuteUseCase, TrackedDirUseCase};

pub fn handle_execute<U: ExecuteUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "execute").entered();
    let parsed = request
        .require_str("command")
        .map(String::from)
        .and_then(|command| Ok((command, optional_session_id(&request)?)));
    let (command, session_id) = match parsed {
        Ok(parsed) => parsed,
        Err(resp) => return resp,
    };
    let result = usecase.execute(ExecuteInput {
        command,
        session_id,
    });
    RpcResponse::success_json(request.id, &result)
}

pub fn handle_commands_list<C, D>(exec: &ExecUseCases<C, D>, request: RpcRequest) -> RpcResponse
where
    C: CommandRunner,
    D: DirectoryStore,
{
    let _span = common::handler_span(&request, "commands_list").entered();
    RpcResponse::success(request.id, json!({ "commands": exec.commands.list() }))
}

pub fn handle_command_exists<C, D>(exec: &ExecUseCases<C, D>, request: RpcRequest) -> RpcResponse
where
    C: CommandRunner,
    D: DirectoryStore,
{
    let _span = common::handler_span(&request, "command_exists").entered();
    let name = match request.require_str("name") {
        Ok(name) => name,
        Err(resp) => return resp,
    };
    let path = exec.commands.find(name);
    RpcResponse::success(
        request.id,
        json!({
            "exists": path.is_some(),
            "path": path.map(|p| p.to_string_lossy().into_owned()),
        }),
    )
}

pub fn handle_cwd_get<U: TrackedDirUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "cwd_get").entered();
    match require_session_id(&request) {
        Ok(id) => RpcResponse::success(request.id, json!({ "cwd": usecase.get(&id) })),
        Err(resp) => resp,
    }
}

pub fn handle_cwd_set<U: TrackedDirUseCase>(usecase: &U, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "cwd_set").entered();
    let parsed = require_session_id(&request)
        .and_then(|id| request.require_str("cwd").map(|cwd| (id, cwd.to_string())));
    match parsed {
        Ok((id, cwd)) => RpcResponse::success(request.id, json!({ "cwd": usecase.set(&id, cwd) })),
        Err(resp) => resp,
    }
}

pub fn handle_home_dir<C, D>(exec: &ExecUseCases<C, D>, request: RpcRequest) -> RpcResponse
where
    C: CommandRunner,
    D: DirectoryStore,
{
    RpcResponse::success(
        request.id,
        json!({ "home": exec.home.to_string_lossy() }),
    )
}

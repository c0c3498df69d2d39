use serde_json::json;

use super::common;
use crate::adapters::rpc::{RpcRequest, RpcResponse, failure};
use crate::infra::daemon::LibraryStore;

pub fn handle_library_save(store: &LibraryStore, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "library_save").entered();
    let Some(item) = request.param("item") else {
        return RpcResponse::invalid_params(request.id, "Missing 'item' param");
    };
    let result = match store.save(item) {
        Ok(id) => json!({ "success": true, "id": id }),
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

pub fn handle_library_load_all(store: &LibraryStore, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "library_load_all").entered();
    match store.load_all() {
        Ok(items) => RpcResponse::success(request.id, json!({ "items": items })),
        Err(e) => RpcResponse::domain_error(
            request.id,
            e.code(),
            &e.to_string(),
            e.category().as_str(),
            None,
        ),
    }
}

pub fn handle_library_load(store: &LibraryStore, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "library_load").entered();
    let id = match request.require_str("id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = match store.load(id) {
        Ok(item) => json!({ "success": true, "item": item }),
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

pub fn handle_library_delete(store: &LibraryStore, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "library_delete").entered();
    let id = match request.require_str("id") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let result = match store.delete(id) {
        Ok(()) => json!({ "success": true }),
        Err(e) => failure(e),
    };
    RpcResponse::success(request.id, result)
}

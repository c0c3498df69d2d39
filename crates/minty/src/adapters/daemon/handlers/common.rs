use tracing::Span;

use crate::adapters::rpc::RpcRequest;

pub fn handler_span(request: &RpcRequest, method: &'static str) -> Span {
    tracing::debug_span!("rpc_handler", method, request_id = request.id)
}

use std::path::Path;

use serde_json::json;

use super::common;
use crate::adapters::rpc::{RpcRequest, RpcResponse, failure};
use crate::infra::indexer::{IndexerProcess, read_context};

const CONTEXT_MISSING: &str = "codebase.md not found. Please index the directory first.";

pub fn handle_index_run(indexer: &IndexerProcess, request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "index_run").entered();
    let dir = match request.require_str("dir") {
        Ok(dir) => dir,
        Err(resp) => return resp,
    };
    let result = match indexer.run(Path::new(dir)) {
        Ok(output) => json!({ "success": true, "output": output }),
        Err(error) => failure(error),
    };
    RpcResponse::success(request.id, result)
}

pub fn handle_index_context(request: RpcRequest) -> RpcResponse {
    let _span = common::handler_span(&request, "index_context").entered();
    let dir = match request.require_str("dir") {
        Ok(dir) => dir,
        Err(resp) => return resp,
    };
    let result = match read_context(Path::new(dir)) {
        Some(content) => json!({ "success": true, "content": content }),
        None => failure(CONTEXT_MISSING),
    };
    RpcResponse::success(request.id, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::indexer::MARKDOWN_FILE;
    use tempfile::TempDir;

    #[test]
    fn test_context_requires_prior_index() {
        let dir = TempDir::new().unwrap();
        let call = || RpcRequest::new(1, "index_context", Some(json!({"dir": dir.path()})));

        let missing = handle_index_context(call());
        assert_eq!(missing.result().unwrap()["error"], CONTEXT_MISSING);

        std::fs::write(dir.path().join(MARKDOWN_FILE), "# Codebase Dump\n\n").unwrap();
        let found = handle_index_context(call());
        assert_eq!(found.result().unwrap()["content"], "# Codebase Dump\n\n");
    }
}

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::common::error_codes;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            _jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref()?.get(key).filter(|v| !v.is_null())
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn param_bool(&self, key: &str, default: bool) -> bool {
        self.param(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub fn param_u64_opt(&self, key: &str) -> Option<u64> {
        self.param(key).and_then(Value::as_u64)
    }

    #[allow(clippy::result_large_err)]
    pub fn require_str(&self, key: &str) -> Result<&str, RpcResponse> {
        self.param_str(key)
            .ok_or_else(|| RpcResponse::invalid_params(self.id, &format!("Missing '{key}' param")))
    }

    #[allow(clippy::result_large_err)]
    pub fn require_u16(&self, key: &str) -> Result<u16, RpcResponse> {
        self.param_u64_opt(key)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| {
                RpcResponse::invalid_params(
                    self.id,
                    &format!("Missing or invalid '{key}' param (expected 0-65535)"),
                )
            })
    }
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: &'static str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcServerError>,
}

#[derive(Debug, Serialize)]
pub struct RpcServerError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ErrorData {
    pub category: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl RpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            _jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn success_json<T: Serialize>(id: u64, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, error_codes::INTERNAL_ERROR, &e.to_string()),
        }
    }

    pub fn action_success(id: u64) -> Self {
        Self::success(id, json!({ "success": true }))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error_code(&self) -> Option<i32> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Protocol error whose `data` is derived from the code alone.
    pub fn error(id: u64, code: i32, message: &str) -> Self {
        Self::error_with_data(
            id,
            code,
            message,
            ErrorData {
                category: error_codes::category_for_code(code).as_str().to_string(),
                retryable: error_codes::is_retryable(code),
                suggestion: None,
            },
        )
    }

    pub fn error_with_data(id: u64, code: i32, message: &str, data: ErrorData) -> Self {
        Self {
            _jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcServerError {
                code,
                message: message.to_string(),
                data: serde_json::to_value(data).ok(),
            }),
        }
    }

    pub fn domain_error(
        id: u64,
        code: i32,
        message: &str,
        category: &str,
        suggestion: Option<String>,
    ) -> Self {
        Self::error_with_data(
            id,
            code,
            message,
            ErrorData {
                category: category.to_string(),
                retryable: error_codes::is_retryable(code),
                suggestion,
            },
        )
    }

    pub fn parse_error(message: &str) -> Self {
        Self::error(0, error_codes::PARSE_ERROR, message)
    }

    pub fn invalid_params(id: u64, message: &str) -> Self {
        Self::error(id, error_codes::INVALID_PARAMS, message)
    }

    pub fn method_not_found(id: u64, method: &str) -> Self {
        Self::error(
            id,
            error_codes::METHOD_NOT_FOUND,
            &format!("Method not found: {method}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(params: Option<Value>) -> RpcRequest {
        RpcRequest::new(1, "test", params)
    }

    #[test]
    fn test_param_helpers() {
        let req = make_request(Some(json!({"name": "x", "on": true, "cols": 80, "gone": null})));
        assert_eq!(req.param_str("name"), Some("x"));
        assert!(req.param_bool("on", false));
        assert!(!req.param_bool("missing", false));
        assert_eq!(req.require_u16("cols").unwrap(), 80);
        assert!(req.param("gone").is_none());
    }

    #[test]
    fn test_require_str_reports_invalid_params() {
        let req = make_request(None);
        let resp = req.require_str("session").unwrap_err();
        assert_eq!(resp.error_code(), Some(error_codes::INVALID_PARAMS));
    }

    #[test]
    fn test_require_u16_rejects_overflow() {
        let req = make_request(Some(json!({"rows": 70000})));
        assert!(req.require_u16("rows").is_err());
    }

    #[test]
    fn test_success_format() {
        let resp = RpcResponse::success(42, json!({"data": "test"}));
        let parsed: Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 42);
        assert!(parsed.get("error").is_none());
    }

    #[test]
    fn test_error_carries_category_data() {
        let resp = RpcResponse::method_not_found(7, "nope");
        let parsed: Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["error"]["code"], -32601);
        assert_eq!(parsed["error"]["message"], "Method not found: nope");
        assert_eq!(parsed["error"]["data"]["category"], "not_found");
        assert_eq!(parsed["error"]["data"]["retryable"], false);
        assert!(parsed.get("result").is_none());
    }

    #[test]
    fn test_domain_error_retryable_follows_code() {
        let resp = RpcResponse::domain_error(
            1,
            error_codes::SESSION_LIMIT,
            "limit",
            "busy",
            Some("Close a tab".into()),
        );
        let parsed: Value = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["error"]["data"]["retryable"], true);
        assert_eq!(parsed["error"]["data"]["suggestion"], "Close a tab");
    }
}

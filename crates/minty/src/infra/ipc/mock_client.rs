//! Canned-response client for handler tests.

use std::collections::HashMap;

use serde_json::Value;
use serde_json::json;

use super::client::{DaemonClient, DaemonClientConfig};
use super::error::ClientError;
use crate::common::error_codes;

#[derive(Default)]
pub struct MockClient {
    responses: HashMap<String, Result<Value, (i32, String)>>,
    calls: Vec<(String, Option<Value>)>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, method: &str, response: Value) -> Self {
        self.responses.insert(method.to_string(), Ok(response));
        self
    }

    pub fn fail(mut self, method: &str, code: i32, message: &str) -> Self {
        self.responses
            .insert(method.to_string(), Err((code, message.to_string())));
        self
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.calls
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .and_then(|(_, params)| params.clone())
    }
}

impl DaemonClient for MockClient {
    fn call_with_config(
        &mut self,
        method: &str,
        params: Option<Value>,
        _config: &DaemonClientConfig,
    ) -> Result<Value, ClientError> {
        self.calls.push((method.to_string(), params));
        match self.responses.get(method) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err((code, message))) => Err(ClientError::RpcError {
                code: *code,
                message: message.clone(),
                category: Some(error_codes::category_for_code(*code)),
                retryable: error_codes::is_retryable(*code),
                suggestion: None,
            }),
            None => Ok(json!({ "success": true })),
        }
    }
}

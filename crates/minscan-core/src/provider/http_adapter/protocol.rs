//! JSON-RPC 2.0 envelopes shared by single and batched calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub(super) struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

impl<'a> JsonRpcRequest<'a> {
    pub(super) fn new(id: u64, method: &'a str, params: &'a [Value]) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// One response object. `id` is only inspected for batch members, where it
/// pairs the answer with its request.
#[derive(Debug, Deserialize)]
pub(super) struct JsonRpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl JsonRpcResponse {
    /// The result payload, or the error object mapped to a `ProviderError`.
    /// A missing result reads as JSON `null`.
    pub(super) fn into_result(self) -> Result<Value, ProviderError> {
        match self.error {
            Some(err) => Err(parse_jsonrpc_error(err)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }

    /// Numeric id of a batch member. Some servers echo ids back as strings.
    pub(super) fn batch_id(&self) -> Result<u64, ProviderError> {
        match &self.id {
            Value::Number(n) => n.as_u64().ok_or_else(|| {
                ProviderError::InvalidResponse(format!("invalid batch response id: {n}"))
            }),
            Value::String(s) => s.parse::<u64>().map_err(|e| {
                ProviderError::InvalidResponse(format!("invalid batch response id string: {e}"))
            }),
            other => Err(ProviderError::InvalidResponse(format!(
                "invalid batch response id: {other}"
            ))),
        }
    }
}

/// `{"code", "message"}` objects become `ServerError`; anything else is
/// reported raw as `InvalidResponse`.
fn parse_jsonrpc_error(err: Value) -> ProviderError {
    #[derive(Deserialize)]
    struct ErrorObject {
        code: i64,
        message: String,
    }

    match ErrorObject::deserialize(&err) {
        Ok(parsed) => ProviderError::ServerError {
            code: parsed.code,
            message: parsed.message,
        },
        Err(_) => ProviderError::InvalidResponse(format!("non-standard JSON-RPC error: {err}")),
    }
}

// Timecapsule — JSON-RPC 2.0 Protocol Types
//
// Minimal JSON-RPC 2.0 envelope for the UDS gateway, plus the mapping from
// capsule failures to error codes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capsule::CapsuleError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes (HTTP analogue in brackets)
pub const UNAUTHORIZED: i32 = -32001; // [401] credential mismatch
pub const FORBIDDEN: i32 = -32002; // [403] owner mismatch
pub const NOT_READY: i32 = -32003; // [403] open time not reached
pub const NOT_FOUND: i32 = -32004; // [404] unknown capsule id

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Create a parse error response (id is null because we couldn't parse it).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// Map a capsule failure onto an error response. `data.kind` carries
    /// the failure name so clients need not match on codes.
    pub fn from_capsule_error(id: Value, err: &CapsuleError) -> Self {
        let code = match err {
            CapsuleError::Validation(_) => INVALID_PARAMS,
            CapsuleError::NotFound(_) => NOT_FOUND,
            CapsuleError::NotReady { .. } => NOT_READY,
            CapsuleError::Unauthorized(_) => UNAUTHORIZED,
            CapsuleError::Forbidden(_) => FORBIDDEN,
            CapsuleError::Storage(_) => INTERNAL_ERROR,
        };

        let mut data = json!({ "kind": err.kind() });
        if let CapsuleError::NotReady { open_at, .. } = err {
            data["open_at"] = json!(open_at.to_rfc3339());
        }

        let mut response = Self::error(id, code, err.to_string());
        if let Some(ref mut error) = response.error {
            error.data = Some(data);
        }
        response
    }

    /// Replace the id field (used when we parsed the request but had a param error).
    pub(crate) fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }
}

impl JsonRpcRequest {
    /// Validate that this is a proper JSON-RPC 2.0 request.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

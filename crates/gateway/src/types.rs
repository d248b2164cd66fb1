// RpcGate - JSON-RPC gateway for OpenAPI-described node APIs
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON-RPC protocol types.
//!
//! - [`RpcRequest`] - Incoming JSON-RPC call with method and positional parameters
//! - [`RpcResponse`] - Outgoing envelope carrying a result or an error
//! - [`RpcError`] - Error object produced by the gateway itself
//! - [`ErrorObject`] - Either a gateway error or an upstream error body relayed verbatim
//!
//! Standard error codes live in [`error_codes`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version emitted in every response
pub const JSONRPC_VERSION: &str = "2.0";

/// Top-level envelope keys that upstream headers may never overwrite
pub const RESERVED_KEYS: &[&str] = &["jsonrpc", "id", "result", "error"];

/// JSON-RPC 2.0 request.
///
/// `jsonrpc` is not checked; `params` and `id` may be omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Method name, in any accepted spelling (e.g. "get_account", "apt_getAccount")
    pub method: String,
    /// Positional parameters
    #[serde(default)]
    pub params: Option<Value>,
    /// Request identifier, echoed back in the response
    #[serde(default)]
    pub id: Option<Value>,
}

/// Error object produced by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code, see [`error_codes`]
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl RpcError {
    /// Creates an error object
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// The request body is not a JSON-RPC call
    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error")
    }

    /// No operation answers to the requested method
    pub fn invalid_request() -> Self {
        Self::new(error_codes::INVALID_REQUEST, "Invalid Request")
    }

    /// The parameters could not be mapped onto the operation
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    /// The upstream call failed before a usable response arrived
    pub fn internal_error() -> Self {
        Self::new(error_codes::INTERNAL_ERROR, "Internal error")
    }

    /// The upstream answered with a status outside the handled ranges
    pub fn server_error() -> Self {
        Self::new(error_codes::SERVER_ERROR, "Server error")
    }
}

/// Value placed under `error`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorObject {
    /// Raised by the gateway
    Gateway(RpcError),
    /// Upstream 4xx/5xx body, unmodified
    Upstream(Value),
}

/// JSON-RPC 2.0 response envelope
///
/// Fields derived from upstream vendor headers are flattened next to `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: &'static str,
    /// Identifier of the request, `null` when absent or unparseable
    pub id: Value,
    /// Successful result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    /// Extra top-level fields
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl RpcResponse {
    fn envelope(id: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, id, result: None, error: None, extensions: Map::new() }
    }

    /// Successful response
    pub fn success(id: Value, result: Value) -> Self {
        Self { result: Some(result), ..Self::envelope(id) }
    }

    /// Response carrying a gateway error
    pub fn error(id: Value, error: RpcError) -> Self {
        Self { error: Some(ErrorObject::Gateway(error)), ..Self::envelope(id) }
    }

    /// Response relaying an upstream error body
    pub fn upstream_error(id: Value, body: Value) -> Self {
        Self { error: Some(ErrorObject::Upstream(body)), ..Self::envelope(id) }
    }

    /// Adds a top-level field, unless `key` is one of [`RESERVED_KEYS`]
    ///
    /// Returns whether the field was added.
    pub fn insert_extension(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            return false;
        }
        self.extensions.insert(key, value);
        true
    }

    /// Error code of a gateway error, if this response carries one
    pub fn error_code(&self) -> Option<i32> {
        match &self.error {
            Some(ErrorObject::Gateway(error)) => Some(error.code),
            _ => None,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod error_codes {
    /// Invalid JSON, or no `method` in the envelope
    pub const PARSE_ERROR: i32 = -32700;
    /// The method does not name any operation
    pub const INVALID_REQUEST: i32 = -32600;
    /// Positional parameters could not be mapped
    pub const INVALID_PARAMS: i32 = -32602;
    /// Transport failure or non-JSON upstream body
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Upstream status outside 2xx/4xx/5xx
    pub const SERVER_ERROR: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let response = RpcResponse::error(Value::Null, RpcError::parse_error());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32700, "message": "Parse error"}})
        );
        assert_eq!(response.error_code(), Some(error_codes::PARSE_ERROR));
    }

    #[test]
    fn test_success_with_extensions() {
        let mut response = RpcResponse::success(json!(7), json!({"chain_id": 4}));
        assert!(response.insert_extension("ledgerVersion", json!("100")));
        assert!(!response.insert_extension("result", json!("clobber")));
        assert!(!response.insert_extension("id", json!("clobber")));

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "result": {"chain_id": 4}, "ledgerVersion": "100"})
        );
        assert_eq!(response.error_code(), None);
    }

    #[test]
    fn test_upstream_error_relayed_verbatim() {
        let body = json!({"message": "not found", "error_code": "account_not_found", "vm_error_code": null});
        let response = RpcResponse::upstream_error(json!("abc"), body.clone());

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"], body);
        assert_eq!(value["id"], "abc");
        assert!(value.get("result").is_none());
        assert_eq!(response.error_code(), None);
    }

    #[test]
    fn test_request_defaults() {
        let request: RpcRequest = serde_json::from_str(r#"{"method":"healthy"}"#).unwrap();
        assert_eq!(request.method, "healthy");
        assert!(request.params.is_none());
        assert!(request.id.is_none());

        assert!(serde_json::from_str::<RpcRequest>(r#"{"params":[]}"#).is_err());
        assert!(serde_json::from_str::<RpcRequest>(r#"{"method":42}"#).is_err());
    }
}

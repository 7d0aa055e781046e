//! JSON-RPC 2.0 wire types for the tool protocol.
//!
//! Requests and responses are line-delimited JSON frames. Tool results
//! travel inside a successful response; a failed tool call is still a
//! JSON-RPC success carrying an `isError` payload, so protocol errors
//! (parse failures, unknown methods) stay distinguishable from tool
//! errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard JSON-RPC error code for malformed frames.
pub const PARSE_ERROR: i32 = -32700;
/// Standard JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Standard JSON-RPC error code for bad or missing params.
pub const INVALID_PARAMS: i32 = -32602;
/// Standard JSON-RPC error code for a server-side failure.
pub const INTERNAL_ERROR: i32 = -32603;

/// One incoming JSON-RPC frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// One outgoing JSON-RPC frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// Protocol-level error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A tool as advertised through `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The body of a `tools/call` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful tool invocation.
    pub fn ok(payload: Value) -> Self {
        Self {
            content: vec![ToolContent::Json { json: payload }],
            is_error: false,
        }
    }

    /// A failed tool invocation. Still a JSON-RPC success; the failure
    /// detail lives in the payload.
    pub fn fail(payload: Value) -> Self {
        Self {
            content: vec![ToolContent::Json { json: payload }],
            is_error: true,
        }
    }
}

/// One content block of a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "json")]
    Json { json: Value },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_response_omits_the_error_field() {
        let response = JsonRpcResponse::success(Some(json!(7)), json!({"ok": true}));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["result"]["ok"], true);
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn error_response_omits_the_result_field() {
        let response = JsonRpcResponse::error(Some(json!(7)), METHOD_NOT_FOUND, "nope");
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["error"]["code"], -32601);
        assert!(wire.get("result").is_none());
    }

    #[test]
    fn tool_result_content_is_tagged() {
        let result = CallToolResult::fail(json!({"error": "pool_saturated"}));
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["isError"], true);
        assert_eq!(wire["content"][0]["type"], "json");
        assert_eq!(wire["content"][0]["json"]["error"], "pool_saturated");
    }

    #[test]
    fn request_params_default_to_none() {
        let request: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert!(request.params.is_none());
        assert_eq!(request.method, "tools/list");
    }
}

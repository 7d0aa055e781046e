//! MCP server: stdio transport and request dispatch.

use crate::error::McpError;
use crate::executor::ToolExecutor;
use crate::protocol::*;
use crate::tools::{builtin_tools, ToolRegistry};
use serde_json::{json, Value};
use std::io::{BufRead, Write};

/// The MCP server for the SQL gateway.
pub struct GatewayServer {
    tools: ToolRegistry,
    executor: ToolExecutor,
}

impl GatewayServer {
    /// Create a server exposing the built-in tool set.
    pub fn new(executor: ToolExecutor) -> Self {
        let mut tools = ToolRegistry::new();
        for tool in builtin_tools() {
            tools.register(tool);
        }
        Self { tools, executor }
    }

    /// The registered tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Serve JSON-RPC over stdio until stdin closes.
    ///
    /// One request per line in, one response per line out. Logs go to
    /// stderr; stdout carries only protocol frames.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("starting MCP server on stdio");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(request) => self.handle_request(request).await,
                Err(err) => {
                    JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {err}"))
                }
            };
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{}", response_json)?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => self.handle_call_tool(id, request.params).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "sqlgate",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<_> = self
            .tools
            .list()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema,
                })
            })
            .collect();

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}"))
                }
            },
            None => return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params"),
        };

        if !self.tools.contains(&params.name) {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("Tool not found: {}", params.name),
            );
        }

        let result = match self.executor.execute(&params.name, params.arguments).await {
            Ok(payload) => CallToolResult::ok(payload),
            Err(err) => {
                tracing::warn!(tool = %params.name, category = err.category(), error = %err, "tool call failed");
                let mut payload = json!({
                    "error": err.category(),
                    "message": err.to_string(),
                });
                if let Some(kind) = err.violation_kind() {
                    payload["kind"] = json!(kind);
                }
                CallToolResult::fail(payload)
            }
        };

        match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Serialization error: {e}"))
            }
        }
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate_core::GatewayConfig;

    fn test_server() -> GatewayServer {
        GatewayServer::new(ToolExecutor::new(&GatewayConfig::default()))
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_reports_server_info() {
        let server = test_server();
        let response = server.handle_request(request("initialize", None)).await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "sqlgate");
    }

    #[tokio::test]
    async fn tools_list_contains_the_builtin_set() {
        let server = test_server();
        let response = server.handle_request(request("tools/list", None)).await;
        let result = response.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 9);
        assert!(tools.iter().any(|t| t["name"] == "select"));
    }

    #[tokio::test]
    async fn unknown_method_is_a_jsonrpc_error() {
        let server = test_server();
        let response = server.handle_request(request("bogus/method", None)).await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let server = test_server();
        let response = server
            .handle_request(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await;
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn missing_params_is_rejected() {
        let server = test_server();
        let response = server.handle_request(request("tools/call", None)).await;
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32602);
    }
}

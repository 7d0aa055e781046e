//! Tool calls that the policy rejects must fail before any backend
//! contact, with a structured error payload the client can act on.

use serde_json::{json, Value};
use sqlgate_core::{GatewayConfig, SecurityConfig};
use sqlgate_mcp::{GatewayServer, ToolExecutor};
use sqlgate_mcp::protocol::JsonRpcRequest;

fn server_with(security: SecurityConfig) -> GatewayServer {
    let config = GatewayConfig {
        security,
        ..GatewayConfig::default()
    };
    GatewayServer::new(ToolExecutor::new(&config))
}

fn call_tool(name: &str, arguments: Value) -> JsonRpcRequest {
    JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: Some(json!(1)),
        method: "tools/call".to_string(),
        params: Some(json!({ "name": name, "arguments": arguments })),
    }
}

fn error_payload(response: &sqlgate_mcp::protocol::JsonRpcResponse) -> Value {
    let result = response.result.as_ref().expect("tool result");
    assert_eq!(result["isError"], true);
    result["content"][0]["json"].clone()
}

#[tokio::test]
async fn injection_shaped_select_is_rejected() {
    let server = server_with(SecurityConfig::default());
    let response = server
        .handle_request(call_tool(
            "select",
            json!({"query": "SELECT * FROM users WHERE id = 1 OR 1=1"}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "security_violation");
    assert_eq!(payload["kind"], "injection_pattern");
}

#[tokio::test]
async fn insert_requires_its_permission_flag() {
    let server = server_with(SecurityConfig::default());
    let response = server
        .handle_request(call_tool(
            "insert",
            json!({"table": "users", "data": {"name": "a"}}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "security_violation");
    assert_eq!(payload["kind"], "operation_not_permitted");
}

#[tokio::test]
async fn ddl_statement_is_rejected_without_the_flag() {
    let server = server_with(SecurityConfig::default());
    let response = server
        .handle_request(call_tool(
            "execute",
            json!({"query": "CREATE TABLE t (id INT)"}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "security_violation");
    assert_eq!(payload["kind"], "forbidden_keyword");
    assert!(payload["message"].as_str().unwrap().contains("CREATE"));
}

#[tokio::test]
async fn update_without_conditions_is_refused() {
    let server = server_with(SecurityConfig {
        allow_update: true,
        ..SecurityConfig::default()
    });
    let response = server
        .handle_request(call_tool(
            "update",
            json!({"table": "users", "data": {"name": "b"}, "conditions": {}}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "security_violation");
    assert_eq!(payload["kind"], "missing_where_clause");
}

#[tokio::test]
async fn delete_without_conditions_is_refused() {
    let server = server_with(SecurityConfig {
        allow_delete: true,
        ..SecurityConfig::default()
    });
    let response = server
        .handle_request(call_tool(
            "delete",
            json!({"table": "users", "conditions": {}}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["kind"], "missing_where_clause");
}

#[tokio::test]
async fn empty_query_is_refused_even_for_super_admin() {
    let server = server_with(SecurityConfig {
        allow_all: true,
        ..SecurityConfig::default()
    });
    let response = server
        .handle_request(call_tool("select", json!({"query": "   "})))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["kind"], "empty_query");
}

#[tokio::test]
async fn malformed_arguments_are_invalid_arguments() {
    let server = server_with(SecurityConfig::default());
    let response = server
        .handle_request(call_tool("describe_table", json!({"no_table": true})))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "invalid_arguments");
}

#[tokio::test]
async fn hostile_identifier_is_refused() {
    let server = server_with(SecurityConfig {
        allow_insert: true,
        ..SecurityConfig::default()
    });
    let response = server
        .handle_request(call_tool(
            "insert",
            json!({"table": "users-prod", "data": {"name": "a"}}),
        ))
        .await;

    let payload = error_payload(&response);
    assert_eq!(payload["error"], "invalid_arguments");
}

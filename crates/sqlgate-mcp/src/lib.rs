//! MCP server implementation.
//!
//! Exposes the gateway's database tools over JSON-RPC 2.0 on stdio:
//! catalog inspection (databases, tables, structure, server status) and
//! policy-gated query execution (select, insert, update, delete, execute).

pub mod error;
pub mod executor;
pub mod format;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::McpError;
pub use executor::ToolExecutor;
pub use server::GatewayServer;

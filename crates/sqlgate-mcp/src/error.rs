//! Server-side error type, with stable categories for tool payloads.

use sqlgate_core::InvalidIdentifier;
use sqlgate_policy::SecurityViolation;
use sqlgate_pool::PoolError;
use thiserror::Error;

/// Anything that can go wrong while serving a tool call.
#[derive(Debug, Error)]
pub enum McpError {
    /// The request frame was structurally invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No tool registered under this name.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// The tool arguments did not deserialize.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The query security policy rejected the call.
    #[error(transparent)]
    Security(#[from] SecurityViolation),

    /// Pool-level failure (saturation, connect, retry, backend error).
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A table/column/database name failed validation.
    #[error(transparent)]
    Identifier(#[from] InvalidIdentifier),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Stable error category, surfaced in tool error payloads so clients
    /// can tell a policy rejection from a saturated pool from a plain
    /// backend error.
    pub fn category(&self) -> &'static str {
        match self {
            McpError::Security(_) => "security_violation",
            McpError::Pool(PoolError::Saturated { .. }) => "pool_saturated",
            McpError::Pool(PoolError::Connect { .. }) => "connection_error",
            McpError::Pool(PoolError::RetryExhausted { .. }) => "retry_exhausted",
            McpError::Pool(PoolError::QueryTimeout { .. }) => "timeout",
            McpError::Pool(PoolError::Backend(_)) => "backend_error",
            McpError::InvalidArguments { .. } | McpError::Identifier(_) => "invalid_arguments",
            McpError::ToolNotFound { .. } => "unknown_tool",
            McpError::InvalidRequest(_) | McpError::Serialization(_) | McpError::Io(_) => {
                "internal"
            }
        }
    }

    /// The violation subtype for security rejections, if any.
    pub fn violation_kind(&self) -> Option<&'static str> {
        match self {
            McpError::Security(violation) => Some(violation.kind.as_str()),
            _ => None,
        }
    }
}

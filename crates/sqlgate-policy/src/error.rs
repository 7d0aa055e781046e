//! Security violation errors raised by query validation.
//!
//! A violation is terminal for the call: the policy engine never recovers,
//! retries, or downgrades a failing check.

use std::fmt;

/// Error type for a rejected query.
#[derive(Debug, Clone)]
pub struct SecurityViolation {
    /// The kind of violation.
    pub kind: ViolationKind,
    /// Human-readable reason, carrying the offending detail (keyword,
    /// schema, limits) so the transport can format a message without
    /// re-deriving it.
    pub message: String,
}

impl SecurityViolation {
    /// Create a new violation.
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The query was empty after trimming.
    pub fn empty_query() -> Self {
        Self::new(ViolationKind::EmptyQuery, "Empty query is not allowed")
    }

    /// The operation is disabled by configuration.
    pub fn operation_not_permitted(operation: &str) -> Self {
        Self::new(
            ViolationKind::OperationNotPermitted,
            format!("Operation {operation} is not permitted by the configuration"),
        )
    }

    /// The query contains a blocked keyword.
    pub fn forbidden_keyword(keyword: &str) -> Self {
        Self::new(
            ViolationKind::ForbiddenKeyword,
            format!("Forbidden keyword detected: {keyword}"),
        )
    }

    /// The query references a schema outside the allow-list.
    pub fn schema_not_allowed(schema: &str) -> Self {
        Self::new(
            ViolationKind::SchemaNotAllowed,
            format!("Schema '{schema}' is not in the allowed schemas list"),
        )
    }

    /// The query matched an injection-shaped pattern.
    pub fn injection_pattern(pattern: &str) -> Self {
        Self::new(
            ViolationKind::InjectionPattern,
            format!("SQL injection pattern detected ({pattern})"),
        )
    }

    /// A read returned more rows than the configured cap.
    pub fn result_limit_exceeded(max: usize, requested: usize) -> Self {
        Self::new(
            ViolationKind::ResultLimitExceeded,
            format!("Result limit exceeded. Maximum: {max}, requested: {requested}"),
        )
    }

    /// An UPDATE or DELETE arrived without any WHERE conditions.
    pub fn missing_where_clause(operation: &str) -> Self {
        Self::new(
            ViolationKind::MissingWhereClause,
            format!("{operation} without WHERE conditions is not allowed"),
        )
    }
}

impl fmt::Display for SecurityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SecurityViolation {}

/// Categories of security violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The query was empty after trimming.
    EmptyQuery,
    /// The declared operation is disabled by configuration.
    OperationNotPermitted,
    /// A DDL or dangerous keyword was found without permission.
    ForbiddenKeyword,
    /// A referenced schema is outside the allow-list.
    SchemaNotAllowed,
    /// The query matched an injection heuristic.
    InjectionPattern,
    /// A read exceeded the configured row cap.
    ResultLimitExceeded,
    /// A mutation arrived without WHERE conditions.
    MissingWhereClause,
}

impl ViolationKind {
    /// Stable machine-readable name, used in tool error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::EmptyQuery => "empty_query",
            ViolationKind::OperationNotPermitted => "operation_not_permitted",
            ViolationKind::ForbiddenKeyword => "forbidden_keyword",
            ViolationKind::SchemaNotAllowed => "schema_not_allowed",
            ViolationKind::InjectionPattern => "injection_pattern",
            ViolationKind::ResultLimitExceeded => "result_limit_exceeded",
            ViolationKind::MissingWhereClause => "missing_where_clause",
        }
    }
}

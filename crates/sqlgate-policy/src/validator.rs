//! Main validator composing the ordered security checks.
//!
//! The `SecurityValidator` is the entry point for validating a query before
//! execution. Checks run in a fixed order and the first failure wins:
//!
//! 1. **Empty query** - trimmed text must be non-empty
//! 2. **Operation permission** - per-operation flags (skipped by `allow_all`)
//! 3. **Keyword permission** - DDL and dangerous keywords (skipped by `allow_all`)
//! 4. **Schema allow-list** - referenced schemas must be listed
//! 5. **Injection heuristics** - never skipped, even for `allow_all`
//!
//! The super-admin flag is elevated authorization, not elevated tolerance
//! for malformed input: it bypasses the permission gates but never the
//! empty-query or injection checks.

use crate::error::SecurityViolation;
use crate::inspect::{QueryInspector, RegexInspector};
use crate::operation::OperationKind;
use crate::redact::preview;
use sqlgate_core::{Dialect, SecurityConfig};

/// Validates queries against the configured security policy.
pub struct SecurityValidator {
    config: SecurityConfig,
    inspector: Box<dyn QueryInspector>,
}

impl SecurityValidator {
    /// Create a validator for the given backend dialect.
    pub fn new(config: SecurityConfig, dialect: Dialect) -> Self {
        Self {
            config,
            inspector: Box::new(RegexInspector::new(dialect.dangerous_keyword_extras())),
        }
    }

    /// Replace the query inspector (e.g. with a tokenizer-based one).
    pub fn with_inspector(mut self, inspector: Box<dyn QueryInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// The active configuration snapshot.
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Validate a query against the policy.
    ///
    /// Returns `Ok(())` if every check passes, or the first failing check's
    /// `SecurityViolation`.
    pub fn validate_query(
        &self,
        query: &str,
        operation: OperationKind,
    ) -> Result<(), SecurityViolation> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(SecurityViolation::empty_query());
        }

        if !self.config.allow_all {
            self.check_operation_permission(operation)?;
            self.check_keyword_permissions(trimmed)?;
        }

        self.check_allowed_schemas(trimmed)?;
        self.check_injection(trimmed)?;

        tracing::debug!(
            operation = %operation,
            query_len = trimmed.len(),
            query = %preview(trimmed, 100),
            "query validated"
        );
        Ok(())
    }

    /// Fail if a read returned more rows than the configured cap.
    pub fn check_result_limit(&self, rows: usize) -> Result<(), SecurityViolation> {
        if rows > self.config.max_results {
            return Err(SecurityViolation::result_limit_exceeded(
                self.config.max_results,
                rows,
            ));
        }
        Ok(())
    }

    fn check_operation_permission(
        &self,
        operation: OperationKind,
    ) -> Result<(), SecurityViolation> {
        let allowed = match operation {
            OperationKind::Insert => self.config.allow_insert,
            OperationKind::Update => self.config.allow_update,
            OperationKind::Delete => self.config.allow_delete,
            OperationKind::Truncate => self.config.allow_truncate,
            _ => true,
        };
        if !allowed {
            return Err(SecurityViolation::operation_not_permitted(
                operation.as_str(),
            ));
        }
        Ok(())
    }

    fn check_keyword_permissions(&self, query: &str) -> Result<(), SecurityViolation> {
        if !self.config.allow_ddl {
            if let Some(keyword) = self.inspector.ddl_keyword(query) {
                tracing::warn!(keyword = %keyword, query = %preview(query, 200), "DDL keyword without permission");
                return Err(SecurityViolation::forbidden_keyword(&keyword));
            }
        }

        if self.config.block_dangerous {
            if let Some(keyword) = self.inspector.dangerous_keyword(query) {
                tracing::warn!(keyword = %keyword, query = %preview(query, 200), "dangerous keyword detected");
                return Err(SecurityViolation::forbidden_keyword(&keyword));
            }
        }

        Ok(())
    }

    fn check_allowed_schemas(&self, query: &str) -> Result<(), SecurityViolation> {
        if self.config.allowed_schemas.is_empty() {
            return Ok(());
        }
        for schema in self.inspector.schema_references(query) {
            if !self.config.allowed_schemas.contains(&schema) {
                return Err(SecurityViolation::schema_not_allowed(&schema));
            }
        }
        Ok(())
    }

    fn check_injection(&self, query: &str) -> Result<(), SecurityViolation> {
        if let Some(pattern) = self.inspector.injection_pattern(query) {
            tracing::warn!(pattern = %pattern, query = %preview(query, 200), "possible SQL injection");
            return Err(SecurityViolation::injection_pattern(pattern));
        }
        Ok(())
    }
}

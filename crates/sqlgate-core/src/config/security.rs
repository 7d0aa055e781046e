//! Query security policy configuration.
//!
//! An immutable snapshot of the policy flags. A validator is constructed
//! from one of these at startup; changing policy means building a new
//! validator, not mutating a live one.

use serde::{Deserialize, Serialize};

/// Security policy flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Allow INSERT statements.
    #[serde(default)]
    pub allow_insert: bool,

    /// Allow UPDATE statements.
    #[serde(default)]
    pub allow_update: bool,

    /// Allow DELETE statements.
    #[serde(default)]
    pub allow_delete: bool,

    /// Allow TRUNCATE statements.
    #[serde(default)]
    pub allow_truncate: bool,

    /// Allow DDL statements (CREATE / ALTER / DROP).
    #[serde(default)]
    pub allow_ddl: bool,

    /// Super-admin flag: bypasses operation and keyword gating. Does NOT
    /// bypass the empty-query or injection checks.
    #[serde(default)]
    pub allow_all: bool,

    /// Block dangerous administrative keywords (GRANT, SHUTDOWN, ...).
    #[serde(default = "default_true")]
    pub block_dangerous: bool,

    /// Schemas queries may reference. Empty means unrestricted.
    #[serde(default)]
    pub allowed_schemas: Vec<String>,

    /// Maximum number of rows a read may return.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_insert: false,
            allow_update: false,
            allow_delete: false,
            allow_truncate: false,
            allow_ddl: false,
            allow_all: false,
            block_dangerous: default_true(),
            allowed_schemas: Vec::new(),
            max_results: default_max_results(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_results() -> usize {
    1000
}

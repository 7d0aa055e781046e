//! Backend database connection configuration.
//!
//! Credentials can be given directly or through a `password_env`
//! indirection so secrets stay out of config files.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};

/// Configuration for the backend database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Which backend to talk to.
    #[serde(default)]
    pub backend: Dialect,

    /// Hostname of the database server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port; defaults to the backend's standard port when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name. Optional: without it the gateway connects in
    /// multi-database mode and tools take an explicit database argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Username; defaults to the backend's conventional superuser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for the connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the password. Takes precedence over
    /// `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Session character set (MySQL only; applied via `SET NAMES`).
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Upper bound for any single backend round trip, in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Dialect::default(),
            host: default_host(),
            port: None,
            database: None,
            username: None,
            password: None,
            password_env: None,
            charset: default_charset(),
            query_timeout_seconds: default_query_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Resolve the effective username.
    pub fn username(&self) -> &str {
        self.username
            .as_deref()
            .unwrap_or_else(|| self.backend.default_username())
    }

    /// Resolve the password, checking `password_env` first.
    pub fn resolve_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env {
            if let Ok(password) = std::env::var(env_var) {
                return Some(password);
            }
        }
        self.password.clone()
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_query_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_falls_back_to_backend_default() {
        let mysql = DatabaseConfig {
            backend: Dialect::MySql,
            ..Default::default()
        };
        assert_eq!(mysql.port(), 3306);

        let pg = DatabaseConfig {
            backend: Dialect::Postgres,
            ..Default::default()
        };
        assert_eq!(pg.port(), 5432);

        let explicit = DatabaseConfig {
            port: Some(6033),
            ..Default::default()
        };
        assert_eq!(explicit.port(), 6033);
    }

    #[test]
    fn password_env_takes_precedence() {
        std::env::set_var("SQLGATE_TEST_DB_SECRET", "from-env");
        let config = DatabaseConfig {
            password: Some("from-file".to_string()),
            password_env: Some("SQLGATE_TEST_DB_SECRET".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_password().as_deref(), Some("from-env"));
        std::env::remove_var("SQLGATE_TEST_DB_SECRET");
    }
}

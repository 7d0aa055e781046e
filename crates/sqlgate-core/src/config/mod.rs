//! Configuration types for the sqlgate SQL gateway.
//!
//! Configuration is loaded from a YAML file (`sqlgate.yaml`) and then
//! overridden by environment variables, so a deployment can keep structural
//! settings in the file and credentials/flags in the environment.
//!
//! Boolean environment values accept the textual truthy set
//! `true`, `1`, `yes`, `on` (case-insensitive); everything else is false.

pub mod database;
pub mod pool;
pub mod security;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub use database::DatabaseConfig;
pub use pool::PoolConfig;
pub use security::SecurityConfig;

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Backend database connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Connection pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Query security policy.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Configuration loading errors. Fatal at startup: the process should not
/// serve requests with a broken configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

impl GatewayConfig {
    /// Load configuration: file first (if present), then environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new("sqlgate.yaml");
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Parse a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply environment-variable overrides in place.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_var("DB_BACKEND") {
            self.database.backend = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "DB_BACKEND".into(),
                    value: v,
                })?;
        }
        if let Some(v) = env_var("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = env_var("DB_PORT") {
            let port: u16 = v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DB_PORT".into(),
                value: v,
            })?;
            self.database.port = Some(port);
        }
        if let Some(v) = env_var("DB_NAME") {
            self.database.database = Some(v);
        }
        if let Some(v) = env_var("DB_USER") {
            self.database.username = Some(v);
        }
        if let Some(v) = env_var("DB_PASS") {
            self.database.password = Some(v);
        }
        if let Some(v) = env_var("QUERY_TIMEOUT") {
            self.database.query_timeout_seconds =
                v.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "QUERY_TIMEOUT".into(),
                    value: v,
                })?;
        }

        if let Some(v) = env_var("CONNECTION_POOL_SIZE") {
            self.pool.max_size = v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "CONNECTION_POOL_SIZE".into(),
                value: v,
            })?;
        }

        if let Some(v) = env_var("ALLOW_INSERT_OPERATION") {
            self.security.allow_insert = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOW_UPDATE_OPERATION") {
            self.security.allow_update = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOW_DELETE_OPERATION") {
            self.security.allow_delete = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOW_TRUNCATE_OPERATION") {
            self.security.allow_truncate = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOW_DDL_OPERATIONS") {
            self.security.allow_ddl = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOW_ALL_OPERATIONS") {
            self.security.allow_all = parse_bool(&v);
        }
        if let Some(v) = env_var("BLOCK_DANGEROUS_KEYWORDS") {
            self.security.block_dangerous = parse_bool(&v);
        }
        if let Some(v) = env_var("ALLOWED_SCHEMAS") {
            self.security.allowed_schemas = parse_list(&v);
        }
        if let Some(v) = env_var("MAX_RESULTS") {
            self.security.max_results = v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "MAX_RESULTS".into(),
                value: v,
            })?;
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parse a textual boolean flag.
///
/// Accepts `true`, `1`, `yes`, `on` (case-insensitive) as true; everything
/// else, including the empty string, is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Parse a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_truthy_set() {
        for v in ["true", "TRUE", "True", "1", "yes", "YES", "on", "On"] {
            assert!(parse_bool(v), "{v} should parse as true");
        }
    }

    #[test]
    fn parse_bool_rejects_everything_else() {
        for v in ["false", "0", "no", "off", "", "2", "enabled", "y"] {
            assert!(!parse_bool(v), "{v} should parse as false");
        }
    }

    #[test]
    fn parse_bool_trims_whitespace() {
        assert!(parse_bool("  true "));
        assert!(parse_bool("\tyes\n"));
    }

    #[test]
    fn parse_list_splits_and_trims() {
        assert_eq!(
            parse_list("app, reporting ,audit"),
            vec!["app", "reporting", "audit"]
        );
    }

    #[test]
    fn parse_list_drops_empty_entries() {
        assert_eq!(parse_list(""), Vec::<String>::new());
        assert_eq!(parse_list("app,,"), vec!["app"]);
    }

    #[test]
    fn config_parses_from_yaml() {
        let yaml = r#"
database:
  backend: postgres
  host: db.internal
  database: appdb
  username: gateway
  password_env: DB_SECRET
pool:
  max_size: 8
security:
  allow_insert: true
  allowed_schemas: ["app", "reporting"]
  max_results: 500
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.pool.max_size, 8);
        assert!(config.security.allow_insert);
        assert!(!config.security.allow_update);
        assert_eq!(config.security.max_results, 500);
        assert_eq!(config.security.allowed_schemas.len(), 2);
    }

    #[test]
    fn defaults_are_safe() {
        let config = GatewayConfig::default();
        assert!(!config.security.allow_insert);
        assert!(!config.security.allow_all);
        assert!(config.security.block_dangerous);
        assert_eq!(config.pool.max_size, 5);
        assert_eq!(config.security.max_results, 1000);
    }
}

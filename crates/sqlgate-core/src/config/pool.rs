//! Connection pool configuration.

use serde::{Deserialize, Serialize};

/// Connection pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of live backend connections.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// How long an idle connection may sit unused before being reaped.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

fn default_max_size() -> usize {
    5
}

fn default_idle_timeout() -> u64 {
    3600
}

//! Application configuration, read from TOML.
//!
//! ```toml
//! [execution]
//! task_retry_count = 3
//! task_retry_delay = 1.0
//! task_retry_backoff = 1.0
//! enabled = true
//! disabled_actions = ["erasure"]
//! disabled_connections = []
//!
//! [database]
//! path = "datagate.db"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::task::{ActionType, RetryPolicy};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Retries after the first failed attempt of a node task
    #[serde(default)]
    pub task_retry_count: u32,

    /// Seconds before the first retry
    #[serde(default = "default_retry_delay")]
    pub task_retry_delay: f64,

    #[serde(default = "default_retry_backoff")]
    pub task_retry_backoff: f64,

    /// When false every node task is skipped
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub disabled_actions: Vec<ActionType>,

    /// Connection keys whose collections are skipped
    #[serde(default)]
    pub disabled_connections: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            task_retry_count: 0,
            task_retry_delay: default_retry_delay(),
            task_retry_backoff: default_retry_backoff(),
            enabled: true,
            disabled_actions: Vec::new(),
            disabled_connections: Vec::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.task_retry_count,
            self.task_retry_delay,
            self.task_retry_backoff,
        )
    }

    pub fn is_action_disabled(&self, action_type: ActionType) -> bool {
        self.disabled_actions.contains(&action_type)
    }

    pub fn is_connection_disabled(&self, connection_key: &str) -> bool {
        self.disabled_connections.iter().any(|k| k == connection_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_retry_backoff() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_database_path() -> String {
    "datagate.db".to_string()
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        if config.execution.task_retry_delay < 0.0 || config.execution.task_retry_backoff < 0.0 {
            anyhow::bail!("task_retry_delay and task_retry_backoff must not be negative");
        }
        Ok(config)
    }
}

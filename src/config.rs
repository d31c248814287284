//! Configuration for the proxy core
//!
//! Session tunables plus the shard topology the surrounding proxy feeds its
//! router and pool from. Loaded from TOML.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{limits, timeout};
use crate::types::ShardId;

/// Serde helper: durations as whole seconds in config files
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

fn default_statement_timeout() -> Duration {
    timeout::STATEMENT
}

fn default_max_fanout() -> usize {
    limits::MAX_FANOUT
}

fn default_max_connections() -> u32 {
    10
}

/// Session-level tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for one statement to resolve across all its shards
    #[serde(with = "duration_secs", default = "default_statement_timeout")]
    pub statement_timeout: Duration,

    /// Maximum number of shards one statement may fan out to
    #[serde(default = "default_max_fanout")]
    pub max_fanout: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            statement_timeout: default_statement_timeout(),
            max_fanout: default_max_fanout(),
        }
    }
}

/// One backend shard in the topology
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Maximum number of concurrent connections the pool may open to this shard
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl ShardConfig {
    /// The shard identity this entry describes
    #[must_use]
    pub fn shard_id(&self) -> ShardId {
        ShardId::new(&self.name)
    }
}

/// Top-level proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    #[serde(default)]
    pub session: SessionConfig,

    /// Backend shard topology
    pub shards: Vec<ShardConfig>,
}

impl ProxyConfig {
    /// Check the topology is usable
    pub fn validate(&self) -> Result<()> {
        if self.shards.is_empty() {
            anyhow::bail!("No shards configured");
        }
        let mut seen = std::collections::HashSet::new();
        for shard in &self.shards {
            if shard.name.trim().is_empty() {
                anyhow::bail!("Shard name cannot be empty");
            }
            if shard.port == 0 {
                anyhow::bail!("Shard '{}' has port 0", shard.name);
            }
            if !seen.insert(shard.name.as_str()) {
                anyhow::bail!("Duplicate shard name '{}'", shard.name);
            }
        }
        if self.session.max_fanout == 0 {
            anyhow::bail!("max_fanout must be at least 1");
        }
        Ok(())
    }

    /// Identities of every configured shard, in declaration order
    #[must_use]
    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.shards.iter().map(ShardConfig::shard_id).collect()
    }
}

/// Load and validate a configuration file
pub fn load_config(config_path: &str) -> Result<ProxyConfig> {
    let config_content = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;

    let config: ProxyConfig = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", config_path, e))?;

    config.validate()?;
    Ok(config)
}

/// Default two-shard topology, useful as a starting point
#[must_use]
pub fn create_default_config() -> ProxyConfig {
    ProxyConfig {
        session: SessionConfig::default(),
        shards: vec![
            ShardConfig {
                name: "shard-0".to_string(),
                host: "127.0.0.1".to_string(),
                port: 3307,
                max_connections: default_max_connections(),
            },
            ShardConfig {
                name: "shard-1".to_string(),
                host: "127.0.0.1".to_string(),
                port: 3308,
                max_connections: default_max_connections(),
            },
        ],
    }
}

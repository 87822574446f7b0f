//! # Engine Configuration System
//!
//! Explicit, validated configuration loading: typed structs populated from a
//! TOML file layered with `ORG_TEMPORAL_*` environment variables, with
//! environment auto-detection (development/test/production). No silent
//! fallbacks; validation failures are surfaced as configuration errors.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use org_temporal_core::config::EngineConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::load()?;
//! let database_url = config.database.url();
//! let sweep_interval = config.scheduler.auto_revert_interval();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use loader::EngineConfig;

/// Database connection and pooling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub pool_max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "org_temporal_development".to_string(),
            pool_max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL, preferring an explicit `url` field.
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Scheduler intervals for the background sweeps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Whether the interval driver starts at all
    pub enabled: bool,
    pub auto_revert_interval_seconds: u64,
    pub consistency_check_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_revert_interval_seconds: 3600,
            consistency_check_interval_seconds: 86400,
        }
    }
}

impl SchedulerConfig {
    pub fn auto_revert_interval(&self) -> Duration {
        Duration::from_secs(self.auto_revert_interval_seconds)
    }

    pub fn consistency_check_interval(&self) -> Duration {
        Duration::from_secs(self.consistency_check_interval_seconds)
    }
}

use serde::Deserialize;
use std::env;

use seatline_core::HoldPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub holds: HoldRules,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Browser origins allowed to send the session cookie. Empty means any
    /// origin, without credentials.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Postgres ledger and Redis holds.
    #[default]
    Durable,
    /// In-process stores; state is lost on restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldRules {
    pub ttl_seconds: u64,
    /// COUNT hint per SCAN page.
    pub scan_count: u32,
}

impl Default for HoldRules {
    fn default() -> Self {
        Self { ttl_seconds: 60, scan_count: 10 }
    }
}

impl HoldRules {
    pub fn policy(&self) -> HoldPolicy {
        HoldPolicy { ttl_seconds: self.ttl_seconds }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_seconds: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "seatline_token".to_string(),
            max_age_seconds: 6 * 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcileConfig {
    pub interval_seconds: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { interval_seconds: 300 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `SEATLINE__REDIS__URL=redis://cache:6379`
            .add_source(config::Environment::with_prefix("SEATLINE").separator("__"))
            .build()?;

        let cfg: Config = s.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.holds.ttl_seconds == 0 {
            return Err(config::ConfigError::Message(
                "holds.ttl_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use risk_core::address::AddressFormat;
use risk_core::{Thresholds, Weights};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub indexer: IndexerConfig,
    pub cache: CacheConfig,
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub policies: PolicyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for one scoring call (or one whole batch)
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    pub url: String,
    pub timeout_seconds: u64,
    /// Records requested per category for one address
    pub page_limit: usize,
    /// Recent transactions used for market statistics
    pub market_sample_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    pub max_capacity: u64,
    /// TTL for address histories, address stats and user stats
    pub history_ttl_seconds: u64,
    pub stats_ttl_seconds: u64,
    pub market_ttl_seconds: u64,
    pub velocity_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            history_ttl_seconds: 300,
            stats_ttl_seconds: 300,
            market_ttl_seconds: 600,
            velocity_ttl_seconds: 120,
        }
    }
}

/// Weights and thresholds validate themselves while deserializing, so a
/// loaded `ScoringConfig` is always consistent.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScoringConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PolicyConfig {
    #[serde(default)]
    pub address: AddressFormat,
    #[serde(default)]
    pub amount: AmountHeuristics,
}

/// Tunable constants of the amount anomaly heuristics (human units).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AmountHeuristics {
    /// Amounts that are exact multiples of this (and at least this) look hand-picked
    pub round_base: Decimal,
    /// Size counted as "large" for the frequent-large pattern
    pub large_transaction: f64,
    /// Share of past large transactions above which the pattern applies
    pub large_ratio: f64,
    pub micro_threshold: f64,
    /// Past transactions required before the user z-score is trusted
    pub min_user_history: usize,
}

impl Default for AmountHeuristics {
    fn default() -> Self {
        Self {
            round_base: dec!(10),
            large_transaction: 100.0,
            large_ratio: 0.5,
            micro_threshold: 0.01,
            min_user_history: 5,
        }
    }
}

impl AppConfig {
    /// Built-in defaults, before any file or environment source.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 7001)?
            .set_default("server.request_timeout_ms", 10_000)?
            .set_default("indexer.url", "http://localhost:8090")?
            .set_default("indexer.timeout_seconds", 5)?
            .set_default("indexer.page_limit", 100)?
            .set_default("indexer.market_sample_limit", 500)?
            .set_default("cache.max_capacity", 10_000)?
            .set_default("cache.history_ttl_seconds", 300)?
            .set_default("cache.stats_ttl_seconds", 300)?
            .set_default("cache.market_ttl_seconds", 600)?
            .set_default("cache.velocity_ttl_seconds", 120)?
            .set_default("scoring.weights.reputation", 0.45)?
            .set_default("scoring.weights.anomaly", 0.35)?
            .set_default("scoring.weights.velocity", 0.20)?
            .set_default("scoring.thresholds.allow", 25)?
            .set_default("scoring.thresholds.hold", 50)?
            .set_default("scoring.thresholds.escalate", 70)?
            .set_default("scoring.thresholds.deny", 85)?)
    }

    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::defaults()?
            // Load from config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (RISK_AGENT__SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("RISK_AGENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Checks that serde cannot express on its own.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "server.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.policies.address.lengths.is_empty() {
            return Err(ConfigError::Message(
                "policies.address.lengths must not be empty".to_string(),
            ));
        }
        if self.policies.amount.round_base <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "policies.amount.round_base must be positive".to_string(),
            ));
        }
        let ttls = [
            ("history", self.cache.history_ttl_seconds),
            ("stats", self.cache.stats_ttl_seconds),
            ("market", self.cache.market_ttl_seconds),
            ("velocity", self.cache.velocity_ttl_seconds),
        ];
        if let Some((name, _)) = ttls.iter().find(|(_, ttl)| *ttl == 0) {
            return Err(ConfigError::Message(format!(
                "cache.{}_ttl_seconds must be positive",
                name
            )));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

use moka::future::Cache;
use moka::Expiry;
use risk_core::{AddressHistory, AddressStats, MarketStats, UserTransactionStats, VelocityStats};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::error::ProviderError;

/// Cache key: one entry per (category, address), plus the market-wide entry
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum CacheKey {
    History(String),
    AddressStats(String),
    UserStats(String),
    Velocity(String),
    Market,
}

/// Cached value wrapper. Values are shared snapshots, never mutated.
///
/// User and velocity stats cache their absence too, so an address with no
/// activity is not looked up again on every request.
#[derive(Debug, Clone)]
pub enum CacheValue {
    History(Arc<AddressHistory>),
    AddressStats(Arc<AddressStats>),
    UserStats(Option<Arc<UserTransactionStats>>),
    Velocity(Option<Arc<VelocityStats>>),
    Market(Arc<MarketStats>),
}

/// Time-to-live per cache category
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub history: Duration,
    pub stats: Duration,
    pub market: Duration,
    pub velocity: Duration,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            history: Duration::from_secs(config.history_ttl_seconds),
            stats: Duration::from_secs(config.stats_ttl_seconds),
            market: Duration::from_secs(config.market_ttl_seconds),
            velocity: Duration::from_secs(config.velocity_ttl_seconds),
        }
    }
}

impl CacheTtls {
    fn for_key(&self, key: &CacheKey) -> Duration {
        match key {
            CacheKey::History(_) => self.history,
            CacheKey::AddressStats(_) | CacheKey::UserStats(_) => self.stats,
            CacheKey::Velocity(_) => self.velocity,
            CacheKey::Market => self.market,
        }
    }
}

/// Every write (insert or overwrite) starts a fresh TTL for its category.
struct CategoryExpiry(CacheTtls);

impl Expiry<CacheKey, CacheValue> for CategoryExpiry {
    fn expire_after_create(
        &self,
        key: &CacheKey,
        _value: &CacheValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.0.for_key(key))
    }

    fn expire_after_update(
        &self,
        key: &CacheKey,
        _value: &CacheValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.0.for_key(key))
    }
}

/// Statistics cache in front of the chain data provider
#[derive(Clone)]
pub struct StatsCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl StatsCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_ttls(config.max_capacity, CacheTtls::from(config))
    }

    pub fn with_ttls(max_capacity: u64, ttls: CacheTtls) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(CategoryExpiry(ttls))
            .build();

        Self { cache }
    }

    /// Get a cached address history
    pub async fn get_history(&self, address: &str) -> Option<Arc<AddressHistory>> {
        match self.cache.get(&CacheKey::History(address.to_string())).await {
            Some(CacheValue::History(history)) => Some(history),
            _ => None,
        }
    }

    /// Cache an address history
    pub async fn put_history(&self, address: &str, history: Arc<AddressHistory>) {
        self.cache
            .insert(CacheKey::History(address.to_string()), CacheValue::History(history))
            .await;
    }

    /// Cached history, or the result of `fetch` stored under the address.
    ///
    /// Concurrent callers for the same address share one `fetch`; a failed
    /// fetch stores nothing.
    pub async fn history_or_fetch<F>(
        &self,
        address: &str,
        fetch: F,
    ) -> Result<Arc<AddressHistory>, ProviderError>
    where
        F: Future<Output = Result<AddressHistory, ProviderError>>,
    {
        let value = self
            .cache
            .try_get_with(CacheKey::History(address.to_string()), async move {
                fetch.await.map(|history| CacheValue::History(Arc::new(history)))
            })
            .await?;

        match value {
            CacheValue::History(history) => Ok(history),
            _ => Err(ProviderError::Unavailable(format!(
                "history entry for {} holds another category",
                address
            ))),
        }
    }

    pub async fn get_address_stats(&self, address: &str) -> Option<Arc<AddressStats>> {
        match self.cache.get(&CacheKey::AddressStats(address.to_string())).await {
            Some(CacheValue::AddressStats(stats)) => Some(stats),
            _ => None,
        }
    }

    pub async fn put_address_stats(&self, address: &str, stats: Arc<AddressStats>) {
        self.cache
            .insert(
                CacheKey::AddressStats(address.to_string()),
                CacheValue::AddressStats(stats),
            )
            .await;
    }

    /// `Some(None)` is a cached "no transactions" answer
    pub async fn get_user_stats(&self, address: &str) -> Option<Option<Arc<UserTransactionStats>>> {
        match self.cache.get(&CacheKey::UserStats(address.to_string())).await {
            Some(CacheValue::UserStats(stats)) => Some(stats),
            _ => None,
        }
    }

    pub async fn put_user_stats(&self, address: &str, stats: Option<Arc<UserTransactionStats>>) {
        self.cache
            .insert(CacheKey::UserStats(address.to_string()), CacheValue::UserStats(stats))
            .await;
    }

    pub async fn get_velocity(&self, address: &str) -> Option<Option<Arc<VelocityStats>>> {
        match self.cache.get(&CacheKey::Velocity(address.to_string())).await {
            Some(CacheValue::Velocity(stats)) => Some(stats),
            _ => None,
        }
    }

    pub async fn put_velocity(&self, address: &str, stats: Option<Arc<VelocityStats>>) {
        self.cache
            .insert(CacheKey::Velocity(address.to_string()), CacheValue::Velocity(stats))
            .await;
    }

    pub async fn get_market(&self) -> Option<Arc<MarketStats>> {
        match self.cache.get(&CacheKey::Market).await {
            Some(CacheValue::Market(stats)) => Some(stats),
            _ => None,
        }
    }

    pub async fn put_market(&self, stats: Arc<MarketStats>) {
        self.cache
            .insert(CacheKey::Market, CacheValue::Market(stats))
            .await;
    }

    /// Get cache statistics for monitoring
    pub async fn stats(&self) -> CacheStats {
        // Flush pending inserts/evictions so the counts are current
        self.cache.run_pending_tasks().await;

        let mut stats = CacheStats::default();
        for (key, _) in self.cache.iter() {
            match key.as_ref() {
                CacheKey::History(_) => stats.histories += 1,
                CacheKey::AddressStats(_) => stats.address_stats += 1,
                CacheKey::UserStats(_) => stats.user_stats += 1,
                CacheKey::Velocity(_) => stats.velocity += 1,
                CacheKey::Market => stats.market += 1,
            }
        }
        stats.entry_count = self.cache.entry_count();
        stats
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub histories: u64,
    pub address_stats: u64,
    pub user_stats: u64,
    pub velocity: u64,
    pub market: u64,
}

/// Shared cache instance
pub type SharedCache = Arc<StatsCache>;

pub fn create_cache(config: &CacheConfig) -> SharedCache {
    Arc::new(StatsCache::new(config))
}

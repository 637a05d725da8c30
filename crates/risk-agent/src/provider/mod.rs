//! Chain data access for the policies
//!
//! [`ChainDataProvider`] is the query contract against whatever indexes the
//! chain. [`CachedChainData`] puts the statistics cache in front of it; the
//! policies only ever talk to the cached view.

pub mod indexer;

use async_trait::async_trait;
use chrono::Utc;
use risk_core::history::address_stats;
use risk_core::stats::user_transaction_stats;
use risk_core::{velocity, AddressHistory, AddressStats, MarketStats, UserTransactionStats, VelocityStats};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::SharedCache;
use crate::error::ProviderError;

pub use indexer::IndexerClient;

/// Raw chain queries. Everything derived from a history is computed once,
/// by [`CachedChainData`], from the cached copy.
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError>;

    async fn market_stats(&self) -> Result<MarketStats, ProviderError>;
}

/// Cache-first view over a provider.
///
/// Values are stored only after the provider call completes, so a caller
/// that gives up half way never leaves a partial entry behind. Address,
/// user and velocity stats all derive from the one cached history.
#[derive(Clone)]
pub struct CachedChainData {
    provider: Arc<dyn ChainDataProvider>,
    cache: SharedCache,
}

impl CachedChainData {
    pub fn new(provider: Arc<dyn ChainDataProvider>, cache: SharedCache) -> Self {
        Self { provider, cache }
    }

    pub async fn address_history(&self, address: &str) -> Result<Arc<AddressHistory>, ProviderError> {
        if let Some(history) = self.cache.get_history(address).await {
            tracing::debug!(address = %address, "Address history cache hit");
            return Ok(history);
        }

        let fetch = async {
            let start = Instant::now();
            let history = self.provider.address_history(address).await?;
            tracing::debug!(
                address = %address,
                total_transactions = %history.total_transactions,
                duration_ms = %start.elapsed().as_millis(),
                "Address history fetched"
            );
            Ok::<_, ProviderError>(history)
        };
        self.cache.history_or_fetch(address, fetch).await
    }

    pub async fn address_stats(&self, address: &str) -> Result<Arc<AddressStats>, ProviderError> {
        if let Some(stats) = self.cache.get_address_stats(address).await {
            tracing::debug!(address = %address, "Address stats cache hit");
            return Ok(stats);
        }

        let history = self.address_history(address).await?;
        let stats = Arc::new(address_stats(&history, Utc::now()));
        self.cache.put_address_stats(address, stats.clone()).await;
        Ok(stats)
    }

    pub async fn market_stats(&self) -> Result<Arc<MarketStats>, ProviderError> {
        if let Some(stats) = self.cache.get_market().await {
            return Ok(stats);
        }

        let start = Instant::now();
        let stats = Arc::new(self.provider.market_stats().await?);
        tracing::debug!(
            sample = %stats.total_transactions,
            duration_ms = %start.elapsed().as_millis(),
            "Market stats refreshed"
        );
        self.cache.put_market(stats.clone()).await;
        Ok(stats)
    }

    /// `None` when the address has no transaction with a positive amount.
    pub async fn user_transaction_stats(
        &self,
        address: &str,
    ) -> Result<Option<Arc<UserTransactionStats>>, ProviderError> {
        if let Some(stats) = self.cache.get_user_stats(address).await {
            return Ok(stats);
        }

        let history = self.address_history(address).await?;
        let records: Vec<_> = history.records().cloned().collect();
        let stats = user_transaction_stats(&records).map(Arc::new);
        self.cache.put_user_stats(address, stats.clone()).await;
        Ok(stats)
    }

    /// `None` when the address has no dated transactions.
    pub async fn velocity_stats(&self, address: &str) -> Result<Option<Arc<VelocityStats>>, ProviderError> {
        if let Some(stats) = self.cache.get_velocity(address).await {
            tracing::debug!(address = %address, "Velocity stats cache hit");
            return Ok(stats);
        }

        let history = self.address_history(address).await?;
        let stats = velocity::analyze(history.records(), Utc::now()).map(Arc::new);
        self.cache.put_velocity(address, stats.clone()).await;
        Ok(stats)
    }
}

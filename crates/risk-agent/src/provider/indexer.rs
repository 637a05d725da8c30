use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use risk_core::stats::market_stats;
use risk_core::{AddressHistory, Amount, MarketStats, TxCategory, TxRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::ChainDataProvider;
use crate::config::IndexerConfig;
use crate::error::ProviderError;

// ============================================================================
// Indexer Client - Transaction history over the indexer REST API
// ============================================================================

#[derive(Clone)]
pub struct IndexerClient {
    client: Client,
    base_url: String,
    timeout_seconds: u64,
    page_limit: usize,
    market_sample_limit: usize,
}

/// Page of transactions as served by the indexer
#[derive(Debug, Deserialize)]
struct TransactionPage {
    #[serde(default)]
    transactions: Vec<IndexedTransaction>,
}

#[derive(Debug, Deserialize)]
struct IndexedTransaction {
    #[serde(alias = "hash", alias = "txhash")]
    id: String,
    #[serde(default)]
    category: Option<TxCategory>,
    #[serde(default, alias = "from")]
    sender: Option<String>,
    #[serde(default, alias = "to")]
    recipient: Option<String>,
    #[serde(default, alias = "contract")]
    venue: Option<String>,
    #[serde(default)]
    amount: Option<Amount>,
    #[serde(default, alias = "created_at")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default = "succeeded_by_default", alias = "success")]
    succeeded: bool,
}

fn succeeded_by_default() -> bool {
    true
}

impl IndexedTransaction {
    fn into_record(self, category: TxCategory) -> TxRecord {
        TxRecord {
            id: self.id,
            category: self.category.unwrap_or(category),
            sender: self.sender,
            recipient: self.recipient,
            venue: self.venue,
            amount: self.amount,
            timestamp: self.timestamp,
            succeeded: self.succeeded,
        }
    }
}

impl IndexerClient {
    pub fn new(config: &IndexerConfig) -> Result<Self, ProviderError> {
        println!("[INDEXER] Using indexer at {}", config.url);
        tracing::debug!(url = %config.url, "Creating indexer client");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            page_limit: config.page_limit,
            market_sample_limit: config.market_sample_limit,
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_seconds)
                } else {
                    ProviderError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(status = %status, url = %url, "Indexer returned an error status");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// Fetch one category of an address's transactions.
    async fn fetch_category(
        &self,
        address: &str,
        category: TxCategory,
    ) -> Result<Vec<TxRecord>, ProviderError> {
        let url = format!("{}/v1/accounts/{}/transactions", self.base_url, address);
        let query = [
            ("category", category.to_string()),
            ("limit", self.page_limit.to_string()),
        ];

        let page: TransactionPage = self.get_page(&url, &query).await?;
        Ok(page
            .transactions
            .into_iter()
            .map(|tx| tx.into_record(category))
            .collect())
    }
}

#[async_trait]
impl ChainDataProvider for IndexerClient {
    /// Fetch every category concurrently. Transfers must succeed; the other
    /// categories degrade to empty with a warning.
    async fn address_history(&self, address: &str) -> Result<AddressHistory, ProviderError> {
        let start = Instant::now();

        let results = join_all(
            TxCategory::ALL
                .iter()
                .map(|category| self.fetch_category(address, *category)),
        )
        .await;

        let mut records = Vec::new();
        let mut degraded = 0;
        for (category, result) in TxCategory::ALL.iter().zip(results) {
            match result {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) if !category.is_required() => {
                    degraded += 1;
                    tracing::warn!(
                        address = %address,
                        category = %category,
                        error = %e,
                        "Auxiliary history unavailable, continuing without it"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        address = %address,
                        category = %category,
                        error = %e,
                        "Transfer history unavailable"
                    );
                    return Err(e);
                }
            }
        }

        let history = AddressHistory::assemble(address, records);
        tracing::info!(
            address = %address,
            total_transactions = %history.total_transactions,
            degraded_categories = %degraded,
            duration_ms = %start.elapsed().as_millis(),
            "Fetched address history"
        );
        Ok(history)
    }

    async fn market_stats(&self) -> Result<MarketStats, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/v1/transactions/recent", self.base_url);
        let query = [("limit", self.market_sample_limit.to_string())];

        let page: TransactionPage = self.get_page(&url, &query).await?;
        let records: Vec<TxRecord> = page
            .transactions
            .into_iter()
            .map(|tx| tx.into_record(TxCategory::TransferSent))
            .collect();

        let stats = market_stats(&records, Utc::now());
        tracing::info!(
            sample = %records.len(),
            average = %stats.average_transaction_size,
            duration_ms = %start.elapsed().as_millis(),
            "Computed market stats"
        );
        Ok(stats)
    }
}

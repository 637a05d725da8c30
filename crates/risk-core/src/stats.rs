//! Descriptive statistics over transaction sizes
//!
//! All sizes are in human units. Market and per-user statistics share the
//! same helpers so their z-scores are directly comparable.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{MarketStats, TxRecord, UserTransactionStats};
use crate::units::amount_in_units;

/// Baseline used when the market sample is empty
pub const BASELINE_AVERAGE_SIZE: f64 = 10.0;
pub const BASELINE_MEDIAN_SIZE: f64 = 5.0;
pub const BASELINE_STD_DEV: f64 = 5.0;
pub const BASELINE_LARGE_THRESHOLD: f64 = 100.0;

/// Per-user "large transaction" cut-off, in human units
pub const USER_LARGE_TRANSACTION: f64 = 100.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median of an ascending slice.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Nearest-rank percentile of an ascending slice (`p` in 0.0-1.0).
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64) * p).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}

/// Distance from `mean` in standard deviations; 0 when the spread is zero.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= f64::EPSILON || !std_dev.is_finite() {
        return 0.0;
    }
    (value - mean).abs() / std_dev
}

/// Positive amounts of the given records in human units, ascending.
pub fn sorted_sizes<'a>(records: impl IntoIterator<Item = &'a TxRecord>) -> Vec<f64> {
    let mut sizes: Vec<f64> = records
        .into_iter()
        .filter_map(|r| r.amount.as_ref().and_then(amount_in_units))
        .filter(|s| *s > 0.0)
        .collect();
    sizes.sort_by(|a, b| a.total_cmp(b));
    sizes
}

/// Aggregate statistics across a market-wide sample of transactions.
pub fn market_stats(records: &[TxRecord], now: DateTime<Utc>) -> MarketStats {
    let sizes = sorted_sizes(records);

    let active_addresses = records
        .iter()
        .flat_map(|r| [r.sender.as_deref(), r.recipient.as_deref()])
        .flatten()
        .collect::<HashSet<_>>()
        .len();

    if sizes.is_empty() {
        return MarketStats {
            total_transactions: 0,
            average_transaction_size: BASELINE_AVERAGE_SIZE,
            median_transaction_size: BASELINE_MEDIAN_SIZE,
            transaction_size_std_dev: BASELINE_STD_DEV,
            total_volume: 0.0,
            active_addresses,
            large_transaction_threshold: BASELINE_LARGE_THRESHOLD,
            last_updated: now,
        };
    }

    MarketStats {
        total_transactions: sizes.len(),
        average_transaction_size: mean(&sizes),
        median_transaction_size: median(&sizes),
        transaction_size_std_dev: std_dev(&sizes),
        total_volume: sizes.iter().sum(),
        active_addresses,
        large_transaction_threshold: percentile(&sizes, 0.95).unwrap_or(BASELINE_LARGE_THRESHOLD),
        last_updated: now,
    }
}

/// Statistics over one address's own transactions; `None` when it has no
/// transaction with a positive amount.
pub fn user_transaction_stats(records: &[TxRecord]) -> Option<UserTransactionStats> {
    let sizes = sorted_sizes(records);
    if sizes.is_empty() {
        return None;
    }

    let mut dates: Vec<DateTime<Utc>> = records.iter().filter_map(|r| r.timestamp).collect();
    dates.sort();
    let first_transaction = dates.first().copied();
    let last_transaction = dates.last().copied();

    let total = sizes.len();
    let transaction_frequency = match (first_transaction, last_transaction) {
        (Some(first), Some(last)) => {
            let days = (last - first).num_seconds() as f64 / SECONDS_PER_DAY;
            if days > 0.0 {
                total as f64 / days
            } else {
                total as f64
            }
        }
        _ => 0.0,
    };

    Some(UserTransactionStats {
        total_transactions: total,
        average_transaction_size: mean(&sizes),
        median_transaction_size: median(&sizes),
        transaction_size_std_dev: std_dev(&sizes),
        large_transaction_count: sizes.iter().filter(|s| **s > USER_LARGE_TRANSACTION).count(),
        first_transaction,
        last_transaction,
        transaction_frequency,
    })
}

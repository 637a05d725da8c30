//! Address history assembly and per-address statistics
//!
//! An [`AddressHistory`] is built once from the records returned by the chain
//! data source and never modified afterwards. [`address_stats`] is a pure
//! function of the history and the reference time, so it can be recomputed
//! at will and cached independently.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{AddressHistory, AddressStats, TxCategory, TxRecord};
use crate::stats::{mean, sorted_sizes};
use crate::units::amount_in_units;

/// Sent transfers below this size (human units) count as "small"
const SMALL_TRANSFER: f64 = 1.0;
/// More small transfers than this marks the address as unusual
const SMALL_TRANSFER_LIMIT: usize = 100;
/// Minimum sends and receives before the wash-trading ratio is considered
const WASH_MIN_EACH_SIDE: usize = 10;
/// min/max of send and receive counts above which activity looks mirrored
const WASH_BALANCE_RATIO: f64 = 0.8;
/// Average size (human units) above which an address is tagged as large
pub const LARGE_AVERAGE_SIZE: f64 = 100.0;

impl AddressHistory {
    /// Group raw records by category and derive the summary fields.
    pub fn assemble(address: impl Into<String>, records: impl IntoIterator<Item = TxRecord>) -> Self {
        let mut history = AddressHistory {
            address: address.into(),
            sent: Vec::new(),
            received: Vec::new(),
            group_contributions: Vec::new(),
            pot_deposits: Vec::new(),
            vault_positions: Vec::new(),
            escrow_cases: Vec::new(),
            total_transactions: 0,
            first_seen: None,
            last_seen: None,
        };

        for record in records {
            let bucket = match record.category {
                TxCategory::TransferSent => &mut history.sent,
                TxCategory::TransferReceived => &mut history.received,
                TxCategory::GroupContribution => &mut history.group_contributions,
                TxCategory::PotDeposit => &mut history.pot_deposits,
                TxCategory::VaultPosition => &mut history.vault_positions,
                TxCategory::EscrowCase => &mut history.escrow_cases,
            };
            bucket.push(record);
        }

        history.total_transactions = history.records().count();
        history.first_seen = history.records().filter_map(|r| r.timestamp).min();
        history.last_seen = history.records().filter_map(|r| r.timestamp).max();
        history
    }

    /// Empty history for an address with no indexed activity.
    pub fn empty(address: impl Into<String>) -> Self {
        Self::assemble(address, std::iter::empty())
    }

    /// Every record across all categories.
    pub fn records(&self) -> impl Iterator<Item = &TxRecord> {
        self.sent
            .iter()
            .chain(&self.received)
            .chain(&self.group_contributions)
            .chain(&self.pot_deposits)
            .chain(&self.vault_positions)
            .chain(&self.escrow_cases)
    }

    pub fn is_empty(&self) -> bool {
        self.total_transactions == 0
    }
}

/// Derive [`AddressStats`] from a history as of `now`.
pub fn address_stats(history: &AddressHistory, now: DateTime<Utc>) -> AddressStats {
    let age_days = history
        .first_seen
        .map(|first| (now - first).num_days().max(0))
        .unwrap_or(0);

    let total = history.total_transactions;
    let failed = history.records().filter(|r| !r.succeeded).count();
    let failure_rate = if total == 0 {
        0.0
    } else {
        failed as f64 / total as f64
    };

    let average_transaction_size = mean(&sorted_sizes(history.records()));

    let distinct_venues = history
        .records()
        .map(|r| r.venue_name())
        .collect::<HashSet<_>>()
        .len();

    let has_unusual_patterns = detect_unusual_patterns(history);

    let mut stats = AddressStats {
        age_days,
        total_transactions: total,
        failure_rate,
        average_transaction_size,
        distinct_venues,
        has_unusual_patterns,
        risk_factors: Vec::new(),
    };
    stats.risk_factors = identify_risk_factors(history, &stats);
    stats
}

/// Activity shapes that suggest spam or wash trading.
pub fn detect_unusual_patterns(history: &AddressHistory) -> bool {
    let small_sends = history
        .sent
        .iter()
        .filter(|r| {
            r.amount
                .as_ref()
                .and_then(amount_in_units)
                .map(|units| units < SMALL_TRANSFER)
                .unwrap_or(true)
        })
        .count();
    if small_sends > SMALL_TRANSFER_LIMIT {
        return true;
    }

    let (sent, received) = (history.sent.len(), history.received.len());
    if sent > WASH_MIN_EACH_SIDE && received > WASH_MIN_EACH_SIDE {
        let ratio = sent.min(received) as f64 / sent.max(received) as f64;
        if ratio > WASH_BALANCE_RATIO {
            return true;
        }
    }

    false
}

pub fn identify_risk_factors(history: &AddressHistory, stats: &AddressStats) -> Vec<String> {
    let mut factors = Vec::new();

    if history.first_seen.is_none() || stats.age_days == 0 {
        factors.push("new-address");
    }
    if stats.total_transactions == 0 {
        factors.push("no-transaction-history");
    }
    if stats.has_unusual_patterns {
        factors.push("suspicious-patterns");
    }
    if stats.failure_rate > 0.2 {
        factors.push("failed-transactions");
    }
    if stats.average_transaction_size > LARGE_AVERAGE_SIZE {
        factors.push("large-transactions");
    }
    if stats.distinct_venues == 1 {
        factors.push("single-contract-interaction");
    }

    factors.into_iter().map(String::from).collect()
}

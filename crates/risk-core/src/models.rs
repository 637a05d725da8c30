//! Data models shared by the scoring engine and the HTTP boundary
//!
//! Request/response types keep the upstream wire format (`from`, `to`,
//! `amount.denom`, `amount.amount`, dotted action names). Statistics types
//! are immutable snapshots: the service replaces them wholesale on refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Scoring Request / Response
// =============================================================================

/// A proposed on-chain action to be scored before submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    /// Address initiating the action
    #[serde(default, alias = "fromAddress", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Counterparty address, if any
    #[serde(default, alias = "toAddress", skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    /// Amount moved by the action, in smallest on-chain units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,

    pub action: ActionKind,

    /// Free-form hints from the caller (e.g. `txPerHour`, `txPerDay`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

/// A coin amount as it appears on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    #[serde(alias = "unit")]
    pub denom: String,

    /// Integer string in the smallest unit (e.g. `"5000000"` for 5 units)
    #[serde(rename = "amount", alias = "quantity")]
    pub quantity: String,
}

impl Amount {
    pub fn new(denom: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            quantity: quantity.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "transfer")]
    Transfer,
    #[serde(rename = "claim")]
    Claim,
    #[serde(rename = "refund")]
    Refund,
    #[serde(rename = "contribute")]
    Contribute,
    #[serde(rename = "escrow.open", alias = "escrowOpen")]
    EscrowOpen,
    #[serde(rename = "vault.deposit", alias = "vaultDeposit")]
    VaultDeposit,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Transfer => write!(f, "transfer"),
            ActionKind::Claim => write!(f, "claim"),
            ActionKind::Refund => write!(f, "refund"),
            ActionKind::Contribute => write!(f, "contribute"),
            ActionKind::EscrowOpen => write!(f, "escrow.open"),
            ActionKind::VaultDeposit => write!(f, "vault.deposit"),
        }
    }
}

/// Result of a single policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    /// Sub-score, always within 0-100
    pub score: u8,
    /// Short categorical tag explaining the score
    pub reason: String,
}

impl PolicyOutcome {
    /// Build an outcome, clamping the raw score into [0, 100].
    pub fn new(score: i64, reason: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0, 100) as u8,
            reason: reason.into(),
        }
    }
}

/// Coarse-grained action class derived from the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Allow,
    Hold,
    Escalate,
    Deny,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Allow => write!(f, "allow"),
            Recommendation::Hold => write!(f, "hold"),
            Recommendation::Escalate => write!(f, "escalate"),
            Recommendation::Deny => write!(f, "deny"),
        }
    }
}

/// Final scoring result.
///
/// Field order is fixed and no map types are involved, so the JSON form is
/// byte-for-byte stable for a given value (signatures over it are reproducible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Combined score, 0-100 (higher = riskier)
    pub score: u8,
    /// Reputation, anomaly and velocity reasons, in that order
    pub reasons: Vec<String>,
    pub recommendation: Recommendation,
}

// =============================================================================
// Indexed Transactions
// =============================================================================

/// Transaction categories tracked per address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxCategory {
    TransferSent,
    TransferReceived,
    GroupContribution,
    PotDeposit,
    VaultPosition,
    EscrowCase,
}

impl TxCategory {
    pub const ALL: [TxCategory; 6] = [
        TxCategory::TransferSent,
        TxCategory::TransferReceived,
        TxCategory::GroupContribution,
        TxCategory::PotDeposit,
        TxCategory::VaultPosition,
        TxCategory::EscrowCase,
    ];

    /// Venue name used when a record does not carry its contract address
    pub fn default_venue(&self) -> &'static str {
        match self {
            TxCategory::TransferSent | TxCategory::TransferReceived => "payments",
            TxCategory::GroupContribution => "groups",
            TxCategory::PotDeposit => "pots",
            TxCategory::VaultPosition => "vaults",
            TxCategory::EscrowCase => "risk_escrow",
        }
    }

    /// Transfers must be available for a history to be trusted; the other
    /// categories may be missing without failing the lookup.
    pub fn is_required(&self) -> bool {
        matches!(self, TxCategory::TransferSent | TxCategory::TransferReceived)
    }
}

impl fmt::Display for TxCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxCategory::TransferSent => write!(f, "transfer_sent"),
            TxCategory::TransferReceived => write!(f, "transfer_received"),
            TxCategory::GroupContribution => write!(f, "group_contribution"),
            TxCategory::PotDeposit => write!(f, "pot_deposit"),
            TxCategory::VaultPosition => write!(f, "vault_position"),
            TxCategory::EscrowCase => write!(f, "escrow_case"),
        }
    }
}

/// Direction of a record relative to the address being analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    Other,
}

/// One indexed transaction touching an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub category: TxCategory,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    /// Contract address the action went through
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_succeeded")]
    pub succeeded: bool,
}

fn default_succeeded() -> bool {
    true
}

impl TxRecord {
    pub fn direction(&self) -> Direction {
        match self.category {
            TxCategory::TransferSent => Direction::Sent,
            TxCategory::TransferReceived => Direction::Received,
            _ => Direction::Other,
        }
    }

    pub fn venue_name(&self) -> &str {
        self.venue
            .as_deref()
            .unwrap_or_else(|| self.category.default_venue())
    }
}

// =============================================================================
// Derived Statistics
// =============================================================================

/// Everything an address has done across the tracked contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressHistory {
    pub address: String,
    pub sent: Vec<TxRecord>,
    pub received: Vec<TxRecord>,
    pub group_contributions: Vec<TxRecord>,
    pub pot_deposits: Vec<TxRecord>,
    pub vault_positions: Vec<TxRecord>,
    pub escrow_cases: Vec<TxRecord>,
    pub total_transactions: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressStats {
    pub age_days: i64,
    pub total_transactions: usize,
    /// Fraction of records that failed, 0.0-1.0
    pub failure_rate: f64,
    /// Mean transaction size in human units
    pub average_transaction_size: f64,
    pub distinct_venues: usize,
    pub has_unusual_patterns: bool,
    pub risk_factors: Vec<String>,
}

/// Market-wide transaction size statistics, in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub total_transactions: usize,
    pub average_transaction_size: f64,
    pub median_transaction_size: f64,
    pub transaction_size_std_dev: f64,
    pub total_volume: f64,
    pub active_addresses: usize,
    /// 95th percentile transaction size
    pub large_transaction_threshold: f64,
    pub last_updated: DateTime<Utc>,
}

/// Per-address transaction size statistics, in human units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTransactionStats {
    pub total_transactions: usize,
    pub average_transaction_size: f64,
    pub median_transaction_size: f64,
    pub transaction_size_std_dev: f64,
    pub large_transaction_count: usize,
    pub first_transaction: Option<DateTime<Utc>>,
    pub last_transaction: Option<DateTime<Utc>>,
    /// Transactions per day over the active period
    pub transaction_frequency: f64,
}

impl UserTransactionStats {
    pub fn large_transaction_ratio(&self) -> f64 {
        if self.total_transactions == 0 {
            0.0
        } else {
            self.large_transaction_count as f64 / self.total_transactions as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityTrend {
    Decreasing,
    Stable,
    Increasing,
    RapidlyIncreasing,
}

/// Time-windowed activity of an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityStats {
    pub transactions_last_hour: usize,
    pub transactions_last_day: usize,
    pub transactions_last_week: usize,
    /// Mean transactions per hour over the last day
    pub average_hourly_rate: f64,
    /// Mean transactions per day over the last week
    pub average_daily_rate: f64,
    /// Busiest hour bucket within the last day
    pub peak_hourly_rate: usize,
    pub burst_detected: bool,
    pub trend: VelocityTrend,
    pub unusual_patterns: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

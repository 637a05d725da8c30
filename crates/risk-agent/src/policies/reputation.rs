use risk_core::address::AddressFormat;
use risk_core::history::LARGE_AVERAGE_SIZE;
use risk_core::rules::{evaluate, Hit, Rule};
use risk_core::{AddressHistory, AddressStats, PolicyOutcome};

use crate::error::ProviderError;
use crate::provider::CachedChainData;

/// Distinct venues above which usage looks organic
const DIVERSE_VENUES: usize = 5;

/// What the reputation rules look at
#[derive(Debug, Clone)]
pub struct ReputationFacts {
    pub has_history: bool,
    pub age_days: i64,
    pub total_transactions: usize,
    pub failure_rate: f64,
    pub has_unusual_patterns: bool,
    pub average_transaction_size: f64,
    pub distinct_venues: usize,
}

impl ReputationFacts {
    pub fn new(history: &AddressHistory, stats: &AddressStats) -> Self {
        Self {
            has_history: history.first_seen.is_some(),
            age_days: stats.age_days,
            total_transactions: stats.total_transactions,
            failure_rate: stats.failure_rate,
            has_unusual_patterns: stats.has_unusual_patterns,
            average_transaction_size: stats.average_transaction_size,
            distinct_venues: stats.distinct_venues,
        }
    }
}

fn age(f: &ReputationFacts) -> Option<Hit> {
    Some(match f.age_days {
        _ if !f.has_history => Hit::new(40, "no-history"),
        d if d < 7 => Hit::new(30, "new-address"),
        d if d < 30 => Hit::new(20, "young-address"),
        _ => Hit::new(5, "established-address"),
    })
}

fn activity(f: &ReputationFacts) -> Option<Hit> {
    Some(match f.total_transactions {
        0 => Hit::new(35, "no-transactions"),
        n if n < 5 => Hit::new(25, "low-activity"),
        n if n < 50 => Hit::new(15, "moderate-activity"),
        _ => Hit::new(5, "established-activity"),
    })
}

fn failures(f: &ReputationFacts) -> Option<Hit> {
    if f.failure_rate > 0.5 {
        Some(Hit::new(30, "high-failure-rate"))
    } else if f.failure_rate > 0.2 {
        Some(Hit::new(15, "elevated-failure-rate"))
    } else {
        None
    }
}

fn unusual_patterns(f: &ReputationFacts) -> Option<Hit> {
    f.has_unusual_patterns
        .then(|| Hit::new(25, "unusual-patterns"))
}

fn large_average(f: &ReputationFacts) -> Option<Hit> {
    (f.average_transaction_size > LARGE_AVERAGE_SIZE).then(|| Hit::new(10, "large-average-size"))
}

fn diverse_usage(f: &ReputationFacts) -> Option<Hit> {
    (f.distinct_venues > DIVERSE_VENUES).then(|| Hit::new(-5, "diverse-usage"))
}

pub const RULES: [Rule<ReputationFacts>; 6] = [
    Rule::new("age", age),
    Rule::new("activity", activity),
    Rule::new("failures", failures),
    Rule::new("unusual_patterns", unusual_patterns),
    Rule::new("large_average", large_average),
    Rule::new("diverse_usage", diverse_usage),
];

/// Scores how trustworthy the sending address looks from its history.
#[derive(Clone)]
pub struct ReputationPolicy {
    data: CachedChainData,
    format: AddressFormat,
}

impl ReputationPolicy {
    pub fn new(data: CachedChainData, format: AddressFormat) -> Self {
        Self { data, format }
    }

    pub async fn evaluate(&self, address: Option<&str>) -> PolicyOutcome {
        let Some(address) = address else {
            return PolicyOutcome::new(0, "no-address");
        };

        if !self.format.is_valid(address) {
            tracing::warn!(address = %address, "Address failed format check");
            return PolicyOutcome::new(75, "invalid-address-format");
        }

        match self.analyze(address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    address = %address,
                    error = %e,
                    "Reputation analysis failed, using conservative score"
                );
                PolicyOutcome::new(50, "analysis-error-conservative-score")
            }
        }
    }

    async fn analyze(&self, address: &str) -> Result<PolicyOutcome, ProviderError> {
        let (history, stats) = tokio::try_join!(
            self.data.address_history(address),
            self.data.address_stats(address),
        )?;

        let facts = ReputationFacts::new(&history, &stats);
        let verdict = evaluate(&RULES, &facts);
        tracing::debug!(
            address = %address,
            score = %verdict.score,
            age_days = %facts.age_days,
            total_transactions = %facts.total_transactions,
            "Reputation evaluated"
        );

        Ok(PolicyOutcome::new(
            i64::from(verdict.score),
            verdict.reason("reputation-ok"),
        ))
    }
}

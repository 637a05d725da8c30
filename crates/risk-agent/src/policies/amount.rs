use risk_core::rules::{evaluate, Hit, Rule};
use risk_core::stats::z_score;
use risk_core::units::{is_multiple_of, parse_positive_quantity, to_units};
use risk_core::{Amount, MarketStats, PolicyOutcome, UserTransactionStats};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::AmountHeuristics;
use crate::error::ProviderError;
use crate::provider::CachedChainData;

/// Distance from a mean, counted on the upper tail only: amounts below the
/// mean are not anomalous, so they score as zero.
fn upper_tail_z(value: f64, mean: f64, std_dev: f64) -> f64 {
    if value < mean {
        0.0
    } else {
        z_score(value, mean, std_dev)
    }
}

/// Sender's own history, when there is enough of it to compare against
#[derive(Debug, Clone)]
pub struct UserBaseline {
    pub mean: f64,
    pub std_dev: f64,
    pub large_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct AmountFacts {
    /// Amount in human units, exact
    pub units: Decimal,
    pub units_f64: f64,
    pub market_mean: f64,
    pub market_std_dev: f64,
    pub user: Option<UserBaseline>,
    pub heuristics: AmountHeuristics,
}

impl AmountFacts {
    pub fn new(
        units: Decimal,
        market: &MarketStats,
        user: Option<&UserTransactionStats>,
        heuristics: AmountHeuristics,
    ) -> Self {
        let user = user
            .filter(|u| u.total_transactions >= heuristics.min_user_history)
            .map(|u| UserBaseline {
                mean: u.average_transaction_size,
                std_dev: u.transaction_size_std_dev,
                large_ratio: u.large_transaction_ratio(),
            });

        Self {
            units,
            units_f64: units.to_f64().unwrap_or(f64::MAX),
            market_mean: market.average_transaction_size,
            market_std_dev: market.transaction_size_std_dev,
            user,
            heuristics,
        }
    }
}

fn absolute_size(f: &AmountFacts) -> Option<Hit> {
    match f.units {
        u if u >= dec!(10000) => Some(Hit::new(85, "extreme-amount")),
        u if u >= dec!(1000) => Some(Hit::new(70, "very-large-amount")),
        u if u >= dec!(100) => Some(Hit::new(45, "large-amount")),
        u if u >= dec!(50) => Some(Hit::new(25, "elevated-amount")),
        _ => None,
    }
}

fn market_deviation(f: &AmountFacts) -> Option<Hit> {
    match upper_tail_z(f.units_f64, f.market_mean, f.market_std_dev) {
        z if z > 5.0 => Some(Hit::new(40, "extreme-market-deviation")),
        z if z > 3.0 => Some(Hit::new(25, "high-market-deviation")),
        z if z > 2.0 => Some(Hit::new(15, "market-deviation")),
        _ => None,
    }
}

fn user_deviation(f: &AmountFacts) -> Option<Hit> {
    let user = f.user.as_ref()?;
    match upper_tail_z(f.units_f64, user.mean, user.std_dev) {
        z if z > 4.0 => Some(Hit::new(35, "extreme-user-deviation")),
        z if z > 2.5 => Some(Hit::new(20, "high-user-deviation")),
        z if z > 1.5 => Some(Hit::new(10, "user-deviation")),
        _ => None,
    }
}

fn frequent_large(f: &AmountFacts) -> Option<Hit> {
    let user = f.user.as_ref()?;
    (user.large_ratio > f.heuristics.large_ratio
        && f.units_f64 >= f.heuristics.large_transaction)
        .then(|| Hit::new(20, "frequent-large-transactions"))
}

fn round_number(f: &AmountFacts) -> Option<Hit> {
    let base = f.heuristics.round_base;
    (f.units >= base && is_multiple_of(f.units, base)).then(|| Hit::new(5, "round-number"))
}

fn micro_transaction(f: &AmountFacts) -> Option<Hit> {
    (f.units_f64 < f.heuristics.micro_threshold).then(|| Hit::new(30, "micro-transaction"))
}

pub const RULES: [Rule<AmountFacts>; 6] = [
    Rule::new("absolute_size", absolute_size),
    Rule::new("market_deviation", market_deviation),
    Rule::new("user_deviation", user_deviation),
    Rule::new("frequent_large", frequent_large),
    Rule::new("round_number", round_number),
    Rule::new("micro_transaction", micro_transaction),
];

/// Fixed tiers on the raw smallest-unit amount, used when no statistics can
/// be fetched.
pub fn fallback_outcome(raw: Decimal) -> PolicyOutcome {
    let (score, tag) = match raw {
        r if r >= dec!(1000000000) => (90, "extreme-amount"),
        r if r >= dec!(100000000) => (60, "very-high-amount"),
        r if r >= dec!(10000000) => (35, "high-amount"),
        _ => (15, "normal-amount"),
    };
    PolicyOutcome::new(score, format!("{}-fallback", tag))
}

/// Scores how unusual the transferred amount is, against the market and
/// against the sender's own history.
#[derive(Clone)]
pub struct AmountPolicy {
    data: CachedChainData,
    heuristics: AmountHeuristics,
}

impl AmountPolicy {
    pub fn new(data: CachedChainData, heuristics: AmountHeuristics) -> Self {
        Self { data, heuristics }
    }

    pub async fn evaluate(&self, amount: Option<&Amount>, address: Option<&str>) -> PolicyOutcome {
        let Some(amount) = amount else {
            return PolicyOutcome::new(0, "no-amount");
        };

        let raw = match parse_positive_quantity(&amount.quantity) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting amount");
                return PolicyOutcome::new(50, "invalid-amount");
            }
        };

        match self.analyze(raw, address).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    address = ?address,
                    amount = %raw,
                    error = %e,
                    "Amount statistics unavailable, using raw tiers"
                );
                fallback_outcome(raw)
            }
        }
    }

    async fn analyze(&self, raw: Decimal, address: Option<&str>) -> Result<PolicyOutcome, ProviderError> {
        let user_stats = async {
            match address {
                Some(address) => self.data.user_transaction_stats(address).await,
                None => Ok(None),
            }
        };
        let (market, user) = tokio::try_join!(self.data.market_stats(), user_stats)?;

        let facts = AmountFacts::new(to_units(raw), &market, user.as_deref(), self.heuristics);
        let verdict = evaluate(&RULES, &facts);
        tracing::debug!(
            units = %facts.units,
            market_mean = %facts.market_mean,
            has_user_baseline = %facts.user.is_some(),
            score = %verdict.score,
            "Amount evaluated"
        );

        Ok(PolicyOutcome::new(
            i64::from(verdict.score),
            verdict.reason("normal-amount"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{cached, StaticProvider};
    use chrono::Utc;
    use risk_core::stats::{
        BASELINE_AVERAGE_SIZE, BASELINE_LARGE_THRESHOLD, BASELINE_MEDIAN_SIZE, BASELINE_STD_DEV,
    };
    use risk_core::{TxCategory, TxRecord};

    fn baseline_market() -> MarketStats {
        MarketStats {
            total_transactions: 0,
            average_transaction_size: BASELINE_AVERAGE_SIZE,
            median_transaction_size: BASELINE_MEDIAN_SIZE,
            transaction_size_std_dev: BASELINE_STD_DEV,
            total_volume: 0.0,
            active_addresses: 0,
            large_transaction_threshold: BASELINE_LARGE_THRESHOLD,
            last_updated: Utc::now(),
        }
    }

    fn user(total: usize, mean: f64, std_dev: f64, large: usize) -> UserTransactionStats {
        UserTransactionStats {
            total_transactions: total,
            average_transaction_size: mean,
            median_transaction_size: mean,
            transaction_size_std_dev: std_dev,
            large_transaction_count: large,
            first_transaction: None,
            last_transaction: None,
            transaction_frequency: 1.0,
        }
    }

    fn score(units: Decimal, user_stats: Option<&UserTransactionStats>) -> u8 {
        let facts = AmountFacts::new(units, &baseline_market(), user_stats, AmountHeuristics::default());
        evaluate(&RULES, &facts).score
    }

    #[test]
    fn test_small_amount_is_quiet() {
        let facts = AmountFacts::new(dec!(5), &baseline_market(), None, AmountHeuristics::default());
        let verdict = evaluate(&RULES, &facts);
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.reason("normal-amount"), "normal-amount");
    }

    #[test]
    fn test_absolute_and_market_tiers() {
        // z = (75 - 10) / 5 = 13 -> +40, plus elevated +25
        assert_eq!(score(dec!(75.5), None), 65);
        // z = 3.2 -> +25
        assert_eq!(score(dec!(26.01), None), 25);
        // 1500: very large +70, z +40
        assert_eq!(score(dec!(1500.5), None), 100);
    }

    #[test]
    fn test_round_and_micro_heuristics() {
        // z = 2 (not > 2), round +5
        assert_eq!(score(dec!(20), None), 5);
        assert_eq!(score(dec!(0.005), None), 30);
        // Below the round base
        assert_eq!(score(dec!(5), None), 0);
    }

    #[test]
    fn test_user_baseline_needs_history() {
        let thin = user(3, 1.0, 0.5, 0);
        assert_eq!(score(dec!(9.5), Some(&thin)), 0);

        // z = (9.5 - 1) / 0.5 = 17 -> +35
        let deep = user(8, 1.0, 0.5, 0);
        assert_eq!(score(dec!(9.5), Some(&deep)), 35);
    }

    #[test]
    fn test_frequent_large_pattern() {
        let whale = user(10, 400.0, 300.0, 7);
        // large +45, market z huge +40, frequent large +20
        assert_eq!(score(dec!(150.5), Some(&whale)), 100);

        let facts = AmountFacts::new(
            dec!(150.5),
            &baseline_market(),
            Some(&whale),
            AmountHeuristics::default(),
        );
        let verdict = evaluate(&RULES, &facts);
        assert!(verdict.reason("").contains("frequent-large-transactions"));
    }

    #[test]
    fn test_monotonic_in_amount() {
        let history = user(12, 40.0, 15.0, 2);
        let mut previous = 0;
        let mut units = dec!(0.013);
        while units < dec!(20000) {
            let current = score(units, Some(&history));
            assert!(
                current >= previous,
                "score dropped from {} to {} at {}",
                previous,
                current,
                units
            );
            previous = current;
            units = units * dec!(1.37) + dec!(0.001);
        }
    }

    #[test]
    fn test_fallback_tiers_on_raw_amount() {
        assert_eq!(fallback_outcome(dec!(2000000000)), PolicyOutcome::new(90, "extreme-amount-fallback"));
        assert_eq!(fallback_outcome(dec!(100000000)), PolicyOutcome::new(60, "very-high-amount-fallback"));
        assert_eq!(fallback_outcome(dec!(10000000)), PolicyOutcome::new(35, "high-amount-fallback"));
        assert_eq!(fallback_outcome(dec!(5000000)), PolicyOutcome::new(15, "normal-amount-fallback"));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_amounts() {
        let (data, provider) = cached(StaticProvider::with_records(Vec::new()));
        let policy = AmountPolicy::new(data, AmountHeuristics::default());

        assert_eq!(policy.evaluate(None, None).await, PolicyOutcome::new(0, "no-amount"));
        for bad in ["0", "-5", "abc", ""] {
            assert_eq!(
                policy.evaluate(Some(&Amount::new("usei", bad)), None).await,
                PolicyOutcome::new(50, "invalid-amount")
            );
        }
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uses_market_and_user_stats() {
        let records: Vec<TxRecord> = (0..6)
            .map(|i| TxRecord {
                id: i.to_string(),
                category: TxCategory::TransferSent,
                sender: None,
                recipient: None,
                venue: None,
                amount: Some(Amount::new("usei", if i % 2 == 0 { "1000000" } else { "2000000" })),
                timestamp: None,
                succeeded: true,
            })
            .collect();
        let (data, _) = cached(StaticProvider::with_records(records));
        let policy = AmountPolicy::new(data, AmountHeuristics::default());

        // 5 units: under the baseline market mean, but far above the user's 1.5 +/- 0.5
        let outcome = policy
            .evaluate(Some(&Amount::new("usei", "5000000")), Some("sei1abc"))
            .await;
        assert_eq!(outcome, PolicyOutcome::new(35, "extreme-user-deviation"));
    }

    #[tokio::test]
    async fn test_oversized_amounts_score_like_the_largest() {
        let (data, _) = cached(StaticProvider::with_records(Vec::new()));
        let policy = AmountPolicy::new(data, AmountHeuristics::default());

        let largest = policy
            .evaluate(Some(&Amount::new("usei", "79228162514264337593543950335")), None)
            .await;
        let beyond = policy
            .evaluate(Some(&Amount::new("usei", "79228162514264337593543950336")), None)
            .await;
        assert_eq!(largest.score, 100);
        assert_eq!(beyond, largest);
    }

    #[tokio::test]
    async fn test_provider_failure_uses_raw_tiers() {
        let (data, _) = cached(StaticProvider::failing());
        let policy = AmountPolicy::new(data, AmountHeuristics::default());

        let outcome = policy
            .evaluate(Some(&Amount::new("usei", "250000000")), Some("sei1abc"))
            .await;
        assert_eq!(outcome, PolicyOutcome::new(60, "very-high-amount-fallback"));
    }
}

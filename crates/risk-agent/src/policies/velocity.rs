use risk_core::rules::{evaluate, Hit, Rule};
use risk_core::velocity::PATTERN_SUDDEN_ACTIVITY;
use risk_core::{PolicyOutcome, VelocityStats, VelocityTrend};
use serde_json::{Map, Value};

use crate::provider::CachedChainData;

// =============================================================================
// Caller-supplied rate hints
// =============================================================================

/// Read a numeric hint from the request context. Numbers and numeric strings
/// are accepted; anything else counts as zero.
fn hint(context: Option<&Map<String, Value>>, key: &str) -> f64 {
    let value = context.and_then(|c| c.get(key));
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Score from the `txPerHour` / `txPerDay` hints alone, with `suffix`
/// appended to the reason.
pub fn context_outcome(context: Option<&Map<String, Value>>, suffix: &str) -> PolicyOutcome {
    let per_hour = hint(context, "txPerHour");
    let per_day = hint(context, "txPerDay");

    let (score, tag) = if per_hour > 400.0 {
        (85, "tx-burst")
    } else if per_hour > 50.0 {
        (55, "high-velocity")
    } else if per_day > 1000.0 {
        (70, "daily-limit-exceeded")
    } else if per_day > 100.0 {
        (30, "active-user")
    } else {
        (10, "low-velocity")
    };

    PolicyOutcome::new(score, format!("{}{}", tag, suffix))
}

// =============================================================================
// Rules over observed activity
// =============================================================================

fn hourly_count(s: &VelocityStats) -> Option<Hit> {
    match s.transactions_last_hour {
        n if n > 100 => Some(Hit::new(90, "extreme-hourly-volume")),
        n if n > 50 => Some(Hit::new(70, "very-high-hourly-volume")),
        n if n > 20 => Some(Hit::new(45, "high-hourly-volume")),
        n if n > 10 => Some(Hit::new(25, "elevated-hourly-volume")),
        _ => None,
    }
}

fn daily_count(s: &VelocityStats) -> Option<Hit> {
    match s.transactions_last_day {
        n if n > 500 => Some(Hit::new(80, "extreme-daily-volume")),
        n if n > 200 => Some(Hit::new(60, "very-high-daily-volume")),
        n if n > 100 => Some(Hit::new(40, "high-daily-volume")),
        n if n > 50 => Some(Hit::new(20, "elevated-daily-volume")),
        _ => None,
    }
}

fn burst(s: &VelocityStats) -> Option<Hit> {
    s.burst_detected.then(|| Hit::new(35, "burst-detected"))
}

fn peak_ratio(s: &VelocityStats) -> Option<Hit> {
    if s.average_hourly_rate <= 0.0 {
        return None;
    }
    match s.peak_hourly_rate as f64 / s.average_hourly_rate {
        r if r > 10.0 => Some(Hit::new(30, "extreme-peak-ratio")),
        r if r > 5.0 => Some(Hit::new(20, "high-peak-ratio")),
        _ => None,
    }
}

fn trend(s: &VelocityStats) -> Option<Hit> {
    match s.trend {
        VelocityTrend::RapidlyIncreasing => Some(Hit::new(25, "rapidly-increasing")),
        VelocityTrend::Increasing => Some(Hit::new(15, "increasing")),
        _ => None,
    }
}

fn patterns(s: &VelocityStats) -> Option<Hit> {
    if s.unusual_patterns.is_empty() {
        return None;
    }
    let delta = 20 * i32::try_from(s.unusual_patterns.len()).unwrap_or(i32::MAX / 20);
    Some(Hit::new(
        delta,
        format!("patterns:{}", s.unusual_patterns.join("+")),
    ))
}

fn daily_vs_weekly(s: &VelocityStats) -> Option<Hit> {
    if s.average_daily_rate <= 0.0 {
        return None;
    }
    match s.transactions_last_day as f64 / s.average_daily_rate {
        r if r > 5.0 => Some(Hit::new(25, "daily-spike")),
        r if r > 3.0 => Some(Hit::new(15, "daily-above-weekly")),
        _ => None,
    }
}

fn dormancy_then_burst(s: &VelocityStats) -> Option<Hit> {
    let woke_up = s
        .unusual_patterns
        .iter()
        .any(|p| p == PATTERN_SUDDEN_ACTIVITY);
    (woke_up && s.burst_detected).then(|| Hit::new(20, "dormancy-then-burst"))
}

pub const RULES: [Rule<VelocityStats>; 8] = [
    Rule::new("hourly_count", hourly_count),
    Rule::new("daily_count", daily_count),
    Rule::new("burst", burst),
    Rule::new("peak_ratio", peak_ratio),
    Rule::new("trend", trend),
    Rule::new("patterns", patterns),
    Rule::new("daily_vs_weekly", daily_vs_weekly),
    Rule::new("dormancy_then_burst", dormancy_then_burst),
];

/// Scores how fast the address is transacting.
#[derive(Clone)]
pub struct VelocityPolicy {
    data: CachedChainData,
}

impl VelocityPolicy {
    pub fn new(data: CachedChainData) -> Self {
        Self { data }
    }

    pub async fn evaluate(
        &self,
        context: Option<&Map<String, Value>>,
        address: Option<&str>,
    ) -> PolicyOutcome {
        let Some(address) = address else {
            return context_outcome(context, "");
        };

        match self.data.velocity_stats(address).await {
            Ok(Some(stats)) => {
                let verdict = evaluate(&RULES, stats.as_ref());
                tracing::debug!(
                    address = %address,
                    last_hour = %stats.transactions_last_hour,
                    last_day = %stats.transactions_last_day,
                    burst = %stats.burst_detected,
                    score = %verdict.score,
                    "Velocity evaluated"
                );
                PolicyOutcome::new(i64::from(verdict.score), verdict.reason("normal-velocity"))
            }
            // No activity to analyze, only the caller's hints are left
            Ok(None) => context_outcome(context, ""),
            Err(e) => {
                tracing::warn!(
                    address = %address,
                    error = %e,
                    "Velocity stats unavailable, using context hints"
                );
                context_outcome(context, "-fallback")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{cached, StaticProvider};
    use chrono::{Duration, Utc};
    use risk_core::velocity::{PATTERN_IDENTICAL_AMOUNTS, PATTERN_REGULAR_INTERVALS};
    use risk_core::{Amount, TxCategory, TxRecord};
    use serde_json::json;

    fn quiet() -> VelocityStats {
        VelocityStats {
            transactions_last_hour: 1,
            transactions_last_day: 4,
            transactions_last_week: 20,
            average_hourly_rate: 4.0 / 24.0,
            average_daily_rate: 20.0 / 7.0,
            peak_hourly_rate: 1,
            burst_detected: false,
            trend: VelocityTrend::Stable,
            unusual_patterns: vec![],
            analyzed_at: Utc::now(),
        }
    }

    fn context(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_context_hints() {
        let cases = [
            (json!({"txPerHour": 500}), 85, "tx-burst"),
            (json!({"txPerHour": "60"}), 55, "high-velocity"),
            (json!({"txPerDay": 1500}), 70, "daily-limit-exceeded"),
            (json!({"txPerDay": "150.5"}), 30, "active-user"),
            (json!({"txPerHour": "lots"}), 10, "low-velocity"),
            (json!({}), 10, "low-velocity"),
        ];
        for (ctx, score, reason) in cases {
            let ctx = context(ctx);
            assert_eq!(context_outcome(Some(&ctx), ""), PolicyOutcome::new(score, reason));
        }
        assert_eq!(context_outcome(None, "-fallback"), PolicyOutcome::new(10, "low-velocity-fallback"));
    }

    #[test]
    fn test_quiet_activity() {
        let verdict = evaluate(&RULES, &quiet());
        // peak 1 vs avg 0.17 is a ratio of 6
        assert_eq!(verdict.score, 20);
        assert_eq!(verdict.reason("normal-velocity"), "high-peak-ratio");

        let flat = VelocityStats {
            peak_hourly_rate: 0,
            ..quiet()
        };
        assert_eq!(evaluate(&RULES, &flat).reason("normal-velocity"), "normal-velocity");
    }

    #[test]
    fn test_volume_tiers() {
        let busy = VelocityStats {
            transactions_last_hour: 60,
            transactions_last_day: 250,
            transactions_last_week: 400,
            average_hourly_rate: 250.0 / 24.0,
            average_daily_rate: 400.0 / 7.0,
            peak_hourly_rate: 60,
            ..quiet()
        };
        // 70 + 60 -> clamped
        assert_eq!(evaluate(&RULES, &busy).score, 100);

        let moderate = VelocityStats {
            transactions_last_hour: 12,
            transactions_last_day: 60,
            transactions_last_week: 200,
            average_hourly_rate: 60.0 / 24.0,
            average_daily_rate: 200.0 / 7.0,
            peak_hourly_rate: 12,
            ..quiet()
        };
        // 25 + 20; peak ratio 4.8 and daily ratio 2.1 stay quiet
        assert_eq!(evaluate(&RULES, &moderate).score, 45);
    }

    #[test]
    fn test_patterns_and_dormancy() {
        let bot = VelocityStats {
            peak_hourly_rate: 0,
            unusual_patterns: vec![
                PATTERN_REGULAR_INTERVALS.to_string(),
                PATTERN_IDENTICAL_AMOUNTS.to_string(),
            ],
            ..quiet()
        };
        let verdict = evaluate(&RULES, &bot);
        assert_eq!(verdict.score, 40);
        assert_eq!(
            verdict.reason(""),
            "patterns:regular-intervals+identical-amounts"
        );

        let woke = VelocityStats {
            transactions_last_hour: 7,
            transactions_last_day: 7,
            transactions_last_week: 8,
            average_hourly_rate: 7.0 / 24.0,
            average_daily_rate: 8.0 / 7.0,
            peak_hourly_rate: 7,
            burst_detected: true,
            trend: VelocityTrend::RapidlyIncreasing,
            unusual_patterns: vec![PATTERN_SUDDEN_ACTIVITY.to_string()],
            ..quiet()
        };
        // burst 35, peak ratio 24 -> 30, trend 25, pattern 20, daily ratio 6.1 -> 25, dormancy 20
        let verdict = evaluate(&RULES, &woke);
        assert_eq!(verdict.score, 100);
        assert!(verdict.reason("").ends_with("dormancy-then-burst"));
    }

    #[tokio::test]
    async fn test_without_address_uses_context() {
        let (data, provider) = cached(StaticProvider::with_records(Vec::new()));
        let policy = VelocityPolicy::new(data);
        let ctx = context(json!({"txPerHour": 70}));

        assert_eq!(policy.evaluate(Some(&ctx), None).await, PolicyOutcome::new(55, "high-velocity"));
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_activity_uses_context_without_suffix() {
        let (data, _) = cached(StaticProvider::with_records(Vec::new()));
        let policy = VelocityPolicy::new(data);

        assert_eq!(
            policy.evaluate(None, Some("sei1abc")).await,
            PolicyOutcome::new(10, "low-velocity")
        );
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_context() {
        let (data, _) = cached(StaticProvider::failing());
        let policy = VelocityPolicy::new(data);
        let ctx = context(json!({"txPerDay": 2000}));

        assert_eq!(
            policy.evaluate(Some(&ctx), Some("sei1abc")).await,
            PolicyOutcome::new(70, "daily-limit-exceeded-fallback")
        );
    }

    #[tokio::test]
    async fn test_burst_from_recent_records() {
        let now = Utc::now();
        let records: Vec<TxRecord> = (0..8)
            .map(|i| TxRecord {
                id: i.to_string(),
                category: TxCategory::TransferSent,
                sender: None,
                recipient: None,
                venue: None,
                amount: Some(Amount::new("usei", format!("{}", 1_000_000 + i * 7_919))),
                timestamp: Some(now - Duration::seconds(20 + i * 37 + i * i * 11)),
                succeeded: true,
            })
            .collect();
        let (data, _) = cached(StaticProvider::with_records(records));
        let policy = VelocityPolicy::new(data);

        let outcome = policy.evaluate(None, Some("sei1abc")).await;
        assert!(outcome.reason.contains("burst-detected"), "{}", outcome.reason);
        assert!(outcome.score >= 35);
    }
}

//! Time-windowed activity analysis
//!
//! Windows are half-open `(start, end]`, so a transaction stamped exactly at
//! a window boundary belongs to the later window. Records without a
//! timestamp, or stamped after the analysis time, are ignored.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::models::{Direction, TxRecord, VelocityStats, VelocityTrend};
use crate::stats::{mean, std_dev};

pub const PATTERN_REGULAR_INTERVALS: &str = "regular-intervals";
pub const PATTERN_IDENTICAL_AMOUNTS: &str = "identical-amounts";
pub const PATTERN_ALTERNATING: &str = "alternating-send-receive";
pub const PATTERN_SUDDEN_ACTIVITY: &str = "sudden-activity";

/// Only the most recent transactions feed the pattern detectors
const PATTERN_SAMPLE: usize = 10;
const REGULAR_MIN_TRANSACTIONS: usize = 5;
/// Gap std-dev below this fraction of the mean gap looks automated
const REGULAR_MAX_VARIATION: f64 = 0.1;
const IDENTICAL_MIN_AMOUNTS: usize = 3;
const IDENTICAL_MIN_SHARE: f64 = 0.7;
const ALTERNATING_SAMPLE: usize = 6;

const BURST_WINDOW_MINUTES: i64 = 15;
const BURST_MIN_COUNT: usize = 5;
const BURST_FACTOR: usize = 5;

const HOUR_SECONDS: i64 = 3_600;

/// Timestamped view of a record, newest first after [`timeline`].
#[derive(Debug, Clone, Copy)]
struct Event<'a> {
    at: DateTime<Utc>,
    record: &'a TxRecord,
}

fn timeline<'a>(
    records: impl IntoIterator<Item = &'a TxRecord>,
    now: DateTime<Utc>,
) -> Vec<Event<'a>> {
    let mut events: Vec<Event<'a>> = records
        .into_iter()
        .filter_map(|record| record.timestamp.map(|at| Event { at, record }))
        .filter(|e| e.at <= now)
        .collect();
    events.sort_by(|a, b| b.at.cmp(&a.at));
    events
}

fn count_between(events: &[Event<'_>], start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    events.iter().filter(|e| e.at > start && e.at <= end).count()
}

/// Compute velocity statistics as of `now`; `None` when no record carries a
/// timestamp at or before `now`.
pub fn analyze<'a>(
    records: impl IntoIterator<Item = &'a TxRecord>,
    now: DateTime<Utc>,
) -> Option<VelocityStats> {
    let events = timeline(records, now);
    if events.is_empty() {
        return None;
    }

    let hour_ago = now - Duration::hours(1);
    let day_ago = now - Duration::days(1);
    let week_ago = now - Duration::weeks(1);

    let transactions_last_hour = count_between(&events, hour_ago, now);
    let transactions_last_day = count_between(&events, day_ago, now);
    let transactions_last_week = count_between(&events, week_ago, now);

    Some(VelocityStats {
        transactions_last_hour,
        transactions_last_day,
        transactions_last_week,
        average_hourly_rate: transactions_last_day as f64 / 24.0,
        average_daily_rate: transactions_last_week as f64 / 7.0,
        peak_hourly_rate: peak_hourly_rate(&events, day_ago, now),
        burst_detected: detect_burst(&events, now),
        trend: trend(&events, now),
        unusual_patterns: unusual_patterns(&events, now),
        analyzed_at: now,
    })
}

/// Largest epoch-aligned hour bucket inside `(start, end]`.
fn peak_hourly_rate(events: &[Event<'_>], start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    let mut buckets: HashMap<i64, usize> = HashMap::new();
    for event in events.iter().filter(|e| e.at > start && e.at <= end) {
        *buckets
            .entry(event.at.timestamp().div_euclid(HOUR_SECONDS))
            .or_default() += 1;
    }
    buckets.into_values().max().unwrap_or(0)
}

fn detect_burst(events: &[Event<'_>], now: DateTime<Utc>) -> bool {
    let window = Duration::minutes(BURST_WINDOW_MINUTES);
    let recent = count_between(events, now - window, now);
    let previous = count_between(events, now - window * 2, now - window);
    recent > BURST_MIN_COUNT && recent > previous * BURST_FACTOR
}

fn trend(events: &[Event<'_>], now: DateTime<Utc>) -> VelocityTrend {
    let hour = Duration::hours(1);
    let recent = count_between(events, now - hour, now);
    let previous = count_between(events, now - hour * 2, now - hour);
    let before = count_between(events, now - hour * 3, now - hour * 2);
    classify_trend(recent, previous, before)
}

pub fn classify_trend(recent: usize, previous: usize, before: usize) -> VelocityTrend {
    if recent > previous * 3 && previous >= before {
        VelocityTrend::RapidlyIncreasing
    } else if recent > previous && previous >= before {
        VelocityTrend::Increasing
    } else if recent < previous && previous <= before {
        VelocityTrend::Decreasing
    } else {
        VelocityTrend::Stable
    }
}

fn unusual_patterns(events: &[Event<'_>], now: DateTime<Utc>) -> Vec<String> {
    let sample = &events[..events.len().min(PATTERN_SAMPLE)];
    let mut patterns = Vec::new();

    if regular_intervals(sample) {
        patterns.push(PATTERN_REGULAR_INTERVALS.to_string());
    }
    if identical_amounts(sample) {
        patterns.push(PATTERN_IDENTICAL_AMOUNTS.to_string());
    }
    if alternating_directions(events) {
        patterns.push(PATTERN_ALTERNATING.to_string());
    }
    if sudden_activity(events, now) {
        patterns.push(PATTERN_SUDDEN_ACTIVITY.to_string());
    }

    patterns
}

fn regular_intervals(sample: &[Event<'_>]) -> bool {
    if sample.len() < REGULAR_MIN_TRANSACTIONS {
        return false;
    }
    let gaps: Vec<f64> = sample
        .windows(2)
        .map(|pair| (pair[0].at - pair[1].at).num_milliseconds() as f64)
        .collect();
    let avg = mean(&gaps);
    // Simultaneous transactions have no cadence to speak of
    if avg <= 0.0 {
        return false;
    }
    std_dev(&gaps) / avg < REGULAR_MAX_VARIATION
}

fn identical_amounts(sample: &[Event<'_>]) -> bool {
    let amounts: Vec<&str> = sample
        .iter()
        .filter_map(|e| e.record.amount.as_ref())
        .map(|a| a.quantity.as_str())
        .filter(|q| !q.is_empty())
        .collect();
    if amounts.len() < IDENTICAL_MIN_AMOUNTS {
        return false;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for amount in amounts.iter().copied() {
        *counts.entry(amount).or_default() += 1;
    }
    let most_common = counts.values().copied().max().unwrap_or(0);
    most_common as f64 / amounts.len() as f64 > IDENTICAL_MIN_SHARE
}

fn alternating_directions(events: &[Event<'_>]) -> bool {
    if events.len() < ALTERNATING_SAMPLE {
        return false;
    }
    let directions: Vec<Direction> = events[..ALTERNATING_SAMPLE]
        .iter()
        .map(|e| e.record.direction())
        .collect();
    if directions.contains(&Direction::Other) {
        return false;
    }
    directions.windows(2).all(|pair| pair[0] != pair[1])
}

fn sudden_activity(events: &[Event<'_>], now: DateTime<Utc>) -> bool {
    let hour_ago = now - Duration::hours(1);
    let day_ago = now - Duration::days(1);
    let week_ago = now - Duration::weeks(1);

    let last_hour = count_between(events, hour_ago, now);
    let rest_of_day = count_between(events, day_ago, hour_ago);
    let rest_of_week = count_between(events, week_ago, day_ago);

    last_hour > 0 && rest_of_day == 0 && rest_of_week > 0
}

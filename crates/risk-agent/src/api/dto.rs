use chrono::{DateTime, Utc};
use risk_core::{RiskScore, ScoringRequest};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

// ============================================================================
// GET /health
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// POST /risk/batch
// ============================================================================

/// One scored batch entry, echoing the request it answers
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItem {
    pub input: ScoringRequest,
    pub result: RiskScore,
}

// ============================================================================
// GET /risk/cache
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub entries: CacheStats,
    pub ttl_seconds: CacheTtlSeconds,
}

#[derive(Debug, Serialize)]
pub struct CacheTtlSeconds {
    pub history: u64,
    pub stats: u64,
    pub market: u64,
    pub velocity: u64,
}

use axum::{extract::State, Json};
use risk_core::{RiskScore, ScoringRequest};
use std::time::Instant;

use super::dto::*;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub async fn health_check() -> Json<HealthResponse> {
    println!("[REQUEST] GET /health");
    tracing::debug!("Processing health check request");

    Json(HealthResponse {
        ok: true,
        service: "risk-agent".to_string(),
        timestamp: chrono::Utc::now(),
    })
}

pub async fn score_transaction(
    State(state): State<AppState>,
    Json(request): Json<ScoringRequest>,
) -> AppResult<Json<RiskScore>> {
    let start = Instant::now();
    println!(
        "[REQUEST] POST /risk/score action={} from={}",
        request.action,
        request.from.as_deref().unwrap_or("-")
    );
    tracing::info!(
        action = %request.action,
        from = ?request.from,
        to = ?request.to,
        "Processing score request"
    );

    let timeout = state.config.request_timeout();
    let result = match tokio::time::timeout(timeout, state.engine.score(&request)).await {
        Ok(result) => result.map_err(AppError::Scoring)?,
        Err(_) => {
            println!(
                "[RESPONSE] POST /risk/score -> 504 Gateway Timeout ({}ms)",
                start.elapsed().as_millis()
            );
            return Err(AppError::Timeout(state.config.server.request_timeout_ms));
        }
    };

    let duration = start.elapsed().as_millis();
    println!(
        "[RESPONSE] POST /risk/score -> 200 OK ({}ms) score={} recommendation={}",
        duration, result.score, result.recommendation
    );
    tracing::info!(
        duration_ms = %duration,
        score = %result.score,
        recommendation = %result.recommendation,
        "Score request completed"
    );

    Ok(Json(result))
}

pub async fn score_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<ScoringRequest>>,
) -> AppResult<Json<Vec<BatchItem>>> {
    let start = Instant::now();
    let count = requests.len();
    println!("[REQUEST] POST /risk/batch count={}", count);
    tracing::info!(count = %count, "Processing batch request");

    let timeout = state.config.request_timeout();
    let scored = match tokio::time::timeout(timeout, state.engine.score_batch(requests)).await {
        Ok(scored) => scored.map_err(AppError::Batch)?,
        Err(_) => {
            println!(
                "[RESPONSE] POST /risk/batch -> 504 Gateway Timeout ({}ms)",
                start.elapsed().as_millis()
            );
            return Err(AppError::Timeout(state.config.server.request_timeout_ms));
        }
    };

    let items: Vec<BatchItem> = scored
        .into_iter()
        .map(|(input, result)| BatchItem { input, result })
        .collect();

    let duration = start.elapsed().as_millis();
    println!(
        "[RESPONSE] POST /risk/batch -> 200 OK ({}ms) count={}",
        duration,
        items.len()
    );
    tracing::info!(
        duration_ms = %duration,
        count = %items.len(),
        "Batch request completed"
    );

    Ok(Json(items))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    println!("[REQUEST] GET /risk/cache");

    let entries = state.cache.stats().await;
    tracing::debug!(entry_count = %entries.entry_count, "Cache stats requested");

    let cache = &state.config.cache;
    Json(CacheStatsResponse {
        entries,
        ttl_seconds: CacheTtlSeconds {
            history: cache.history_ttl_seconds,
            stats: cache.stats_ttl_seconds,
            market: cache.market_ttl_seconds,
            velocity: cache.velocity_ttl_seconds,
        },
    })
}

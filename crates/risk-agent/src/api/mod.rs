pub mod dto;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Scoring
        .route("/risk/score", post(handlers::score_transaction))
        .route("/risk/batch", post(handlers::score_batch))
        // Operations
        .route("/risk/cache", get(handlers::cache_stats))
}

//! # Risk Agent
//!
//! HTTP service that scores proposed on-chain actions before they are
//! submitted. Each request fans out to three policies (address reputation,
//! amount anomaly, velocity) backed by a shared statistics cache in front of
//! the chain indexer; their sub-scores are combined into one bounded score
//! and a recommendation.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod policies;
pub mod provider;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::{create_cache, SharedCache};
use crate::config::AppConfig;
use crate::engine::RiskEngine;
use crate::provider::{CachedChainData, ChainDataProvider};

pub use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: RiskEngine,
    pub cache: SharedCache,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the cache, the cached provider view and the engine together.
    pub fn new(config: AppConfig, provider: Arc<dyn ChainDataProvider>) -> Self {
        let cache = create_cache(&config.cache);
        let data = CachedChainData::new(provider, cache.clone());
        let engine = RiskEngine::new(data, &config);

        Self {
            engine,
            cache,
            config: Arc::new(config),
        }
    }
}

/// Full application router with middleware.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(api::create_router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

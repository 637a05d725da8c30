use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failure at the chain-data boundary. Policies never let these escape;
/// each maps them to its own fallback outcome.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Indexer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Indexer returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode indexer response: {0}")]
    Decode(String),

    #[error("Indexer request timed out after {0}s")]
    Timeout(u64),

    #[error("Chain data unavailable: {0}")]
    Unavailable(String),

    /// A failure reported to every caller waiting on the same fetch
    #[error(transparent)]
    Shared(#[from] std::sync::Arc<ProviderError>),
}

/// Aggregation-fatal failure, the only kind that reaches the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{policy} policy task failed: {message}")]
    PolicyTask {
        policy: &'static str,
        message: String,
    },

    #[error("Batch item {index} failed: {message}")]
    BatchItem { index: usize, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Scoring failed: {0}")]
    Scoring(#[source] EngineError),

    #[error("Batch processing failed: {0}")]
    Batch(#[source] EngineError),

    #[error("Scoring timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, tag, code) = match &self {
            AppError::Scoring(e) => {
                tracing::error!(error = %e, error_code = "SCORING_FAILED", "Risk aggregation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal-server-error", "SCORING_FAILED")
            }
            AppError::Batch(e) => {
                tracing::error!(error = %e, error_code = "BATCH_FAILED", "Batch scoring failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "batch-processing-failed", "BATCH_FAILED")
            }
            AppError::Timeout(ms) => {
                tracing::warn!(timeout_ms = %ms, error_code = "SCORING_TIMEOUT", "Scoring timed out");
                (StatusCode::GATEWAY_TIMEOUT, "scoring-timeout", "SCORING_TIMEOUT")
            }
        };

        tracing::debug!(
            status_code = %status.as_u16(),
            error_code = %code,
            error_message = %self,
            "Returning error response"
        );

        let body = Json(ErrorResponse {
            error: tag.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

//! Error types for Risk Core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

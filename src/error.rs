//! Error types for the portfolio engine

use crate::types::MissingData;
use thiserror::Error;

/// Engine error
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing {kind} data for {symbol}")]
    MissingMarketData { symbol: String, kind: MissingData },

    #[error("Concurrent modification of portfolio {portfolio_id}, retry the operation")]
    ConcurrencyConflict { portfolio_id: i64 },

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Portfolio {0} not found")]
    PortfolioNotFound(i64),

    #[error("Portfolio {0} is archived")]
    PortfolioArchived(i64),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::PersistenceFailure(e.to_string())
    }
}

impl EngineError {
    /// Whether the whole read-modify-write may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for Tiingo API operations.

use thiserror::Error;

use crate::market_data::ProviderError;

/// Errors from Tiingo API operations.
#[derive(Error, Debug)]
pub enum TiingoError {
    #[error("Rate limited by Tiingo API")]
    RateLimited,
    #[error("Invalid API key (HTTP 401)")]
    InvalidApiKey,
    #[error("Failed to parse response: {0}")]
    ParseFailed(String),
    #[error("Network error")]
    Network(#[from] reqwest::Error),
}

impl From<TiingoError> for ProviderError {
    fn from(e: TiingoError) -> Self {
        match e {
            TiingoError::RateLimited => ProviderError::RateLimited { provider: "tiingo" },
            other => ProviderError::Upstream {
                provider: "tiingo",
                message: other.to_string(),
            },
        }
    }
}

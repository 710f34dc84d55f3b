//! Error types for promptgate.

use thiserror::Error;

/// Errors surfaced by the library.
#[derive(Error, Debug)]
pub enum GateError {
    /// Invalid configuration (zero capacity, non-positive refill window, ...).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The admission controller rejected the request.
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// The upstream provider returned an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// No usable upstream provider (missing credentials, auth rejected).
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Chat history could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GateError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::RateLimited(_) | GateError::Provider(_))
    }

    /// The underlying message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            GateError::Config(msg)
            | GateError::RateLimited(msg)
            | GateError::Provider(msg)
            | GateError::ProviderUnavailable(msg)
            | GateError::Storage(msg) => msg.clone(),
            GateError::Io(e) => e.to_string(),
            GateError::Json(e) => e.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GateError>;

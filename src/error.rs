//! Error types for geocell encoding, index storage and proximity search.

use thiserror::Error;

/// Errors returned by the geocell crate.
#[derive(Debug, Error)]
pub enum GeocellError {
    /// Out-of-range or non-finite coordinates, distances or limits.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A geocell string that is empty, too long, or uses characters outside the alphabet.
    #[error("Invalid geocell: {0}")]
    InvalidGeocell(String),

    /// An index column that could not be decoded.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Failure reported by the backing index store.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration that failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeocellError>;

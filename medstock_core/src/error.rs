//! Error types for the medstock_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medstock_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected at the boundary (bad dose time, empty schedule, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No medicine matched the given id
    #[error("Medicine not found: {0}")]
    NotFound(String),

    /// Persisted state could not be used
    #[error("State error: {0}")]
    State(String),
}

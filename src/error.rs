//! Unified error types for the engine.
//!
//! Classifier failures get their own variants so the batch layer can tell
//! recoverable conditions (leave the message unclassified, retry on a later
//! pass) apart from terminal ones.

use thiserror::Error;

/// Engine error type for adapters and services.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Classifier timed out after {0}s")]
    ClassifierTimeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// A recoverable classifier failure: the message stays unclassified and
    /// remains eligible for a future pass.
    pub fn is_classifier_failure(&self) -> bool {
        matches!(
            self,
            EngineError::ClassifierUnavailable(_) | EngineError::ClassifierTimeout(_)
        )
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Database(e.to_string())
    }
}

impl From<r2d2::Error> for EngineError {
    fn from(e: r2d2::Error) -> Self {
        EngineError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(e: toml::de::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;

//! Error types for the console

use thiserror::Error;

/// Console-wide error type
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TallyError {
    pub fn api(msg: impl Into<String>) -> Self {
        TallyError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        TallyError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        TallyError::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TallyError::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        TallyError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TallyError::Internal(msg.into())
    }
}

/// Result type alias for console operations
pub type TallyResult<T> = Result<T, TallyError>;

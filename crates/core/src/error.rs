use thiserror::Error;
use uuid::Uuid;

pub type SurveyResult<T> = Result<T, SurveyError>;

#[derive(Error, Debug)]
pub enum SurveyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Question catalog error: {0}")]
    Catalog(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Survey instance {0} not found")]
    SurveyNotFound(Uuid),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for SurveyError {
    fn from(err: config::ConfigError) -> Self {
        SurveyError::Config(err.to_string())
    }
}

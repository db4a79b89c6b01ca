use crate::domain::AnalysisError;
use thiserror::Error;

/// Trend coach application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {field}")]
    InvalidInput { field: String },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl Error {
    pub fn invalid_input(field: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
        }
    }

    pub fn invalid_transition(reason: impl Into<String>) -> Self {
        Self::InvalidStateTransition(reason.into())
    }

    /// The analysis failure behind this error, if any
    pub fn as_analysis(&self) -> Option<&AnalysisError> {
        match self {
            Self::Analysis(error) => Some(error),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

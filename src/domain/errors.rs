//! Error types for trend analysis and its collaborators

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::types::SubjectId;

/// Message shown when an analysis run failed and can be retried
pub const RETRY_MESSAGE: &str = "The analysis failed. Please try again.";

/// Errors surfaced by the analysis engine
///
/// `Clone` because a single outcome is delivered to every caller waiting on
/// the same in-flight computation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Subject not found: {subject}")]
    NotFound { subject: SubjectId },

    #[error("Summarizer timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Summarizer returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Analysis was cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Whether re-invoking the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout(_) | Self::Upstream(_) | Self::MalformedOutput(_)
        )
    }

    /// Whether the caller must fix its input or setup before running anything
    pub fn blocks_execution(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Configuration(_))
    }

    /// Text suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(reason) => format!("Please check the selected dates: {reason}"),
            Self::NotFound { subject } => format!("No rep named {subject} was found."),
            Self::UpstreamTimeout(_) | Self::Upstream(_) | Self::MalformedOutput(_) => {
                RETRY_MESSAGE.to_string()
            }
            Self::Configuration(_) => {
                "Trend analysis is not configured. Contact an administrator.".to_string()
            }
            Self::Cancelled => "The analysis was cancelled.".to_string(),
        }
    }
}

/// Failure of a single summarizer invocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizerError {
    #[error("summarizer call timed out after {0:?}")]
    Timeout(Duration),

    #[error("summarizer upstream error: {0}")]
    Upstream(String),

    #[error("summarizer output could not be parsed: {0}")]
    MalformedOutput(String),
}

impl From<SummarizerError> for AnalysisError {
    fn from(err: SummarizerError) -> Self {
        match err {
            SummarizerError::Timeout(after) => Self::UpstreamTimeout(after),
            SummarizerError::Upstream(msg) => Self::Upstream(msg),
            SummarizerError::MalformedOutput(msg) => Self::MalformedOutput(msg),
        }
    }
}

/// Failure of the call record store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordStoreError {
    #[error("unknown subject: {0}")]
    NotFound(SubjectId),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl From<RecordStoreError> for AnalysisError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::NotFound(subject) => Self::NotFound { subject },
            RecordStoreError::Unavailable(msg) => Self::Upstream(msg),
        }
    }
}

//! Bounded, cancellable summarizer invocation

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::application::ports::{Summarizer, SummaryRequest};
use crate::domain::{AnalysisError, SummarizerError, TrendAnalysisResult};

/// Summarizer handle that applies the per-call timeout and cancellation
#[derive(Clone)]
pub struct SummarizerInvoker {
    summarizer: Arc<dyn Summarizer>,
    timeout: Duration,
}

impl SummarizerInvoker {
    pub fn new(summarizer: Arc<dyn Summarizer>, timeout: Duration) -> Self {
        Self {
            summarizer,
            timeout,
        }
    }

    /// One summarizer call; a timeout is a failure of this call and is not retried
    pub async fn invoke(
        &self,
        request: &SummaryRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<TrendAnalysisResult, AnalysisError> {
        let call = tokio::time::timeout(self.timeout, self.summarizer.summarize(request));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AnalysisError::Cancelled),
            outcome = call => match outcome {
                Ok(result) => result.map_err(AnalysisError::from),
                Err(_) => {
                    warn!(timeout_ms = self.timeout.as_millis() as u64, "summarizer call timed out");
                    Err(SummarizerError::Timeout(self.timeout).into())
                }
            },
        }
    }
}

//! Summarizer backed by a raw-text language model
//!
//! The request is rendered into a prompt that embeds the call data as JSON,
//! and the model's reply is parsed back into a `TrendAnalysisResult`. Replies
//! that do not parse surface as `MalformedOutput`.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::ports::{Summarizer, SummaryRequest};
use crate::domain::{SummarizerError, TrendAnalysisResult};

const INSTRUCTIONS: &str = "You are a sales coach reviewing graded sales calls. \
Reply with a single JSON object with the fields summary, periodAnalysis \
{totalCalls, averageScore, scoreTrend: improving|declining|stable|insufficient_data}, \
strengths, improvements, coachingFocus and recurringPatterns. \
For a synthesis request, merge the chunk summaries in order, earliest first.";

/// Text-in, text-out completion endpoint
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, SummarizerError>;
}

pub struct ModelSummarizer<M> {
    model: M,
}

impl<M: TextModel> ModelSummarizer<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

fn render_prompt(request: &SummaryRequest<'_>) -> Result<String, SummarizerError> {
    let payload = serde_json::to_string(request)
        .map_err(|e| SummarizerError::Upstream(format!("could not encode request: {e}")))?;
    Ok(format!("{INSTRUCTIONS}\n\n{payload}"))
}

/// Number of calls the request covers, known without asking the model
fn covered_calls(request: &SummaryRequest<'_>) -> usize {
    match request {
        SummaryRequest::Calls { calls, .. } => calls.len(),
        SummaryRequest::Synthesis { total_calls, .. } => *total_calls,
    }
}

#[async_trait]
impl<M: TextModel> Summarizer for ModelSummarizer<M> {
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<TrendAnalysisResult, SummarizerError> {
        let prompt = render_prompt(request)?;
        let reply = self.model.complete(&prompt).await?;
        debug!(reply_len = reply.len(), "model replied");

        let mut result = TrendAnalysisResult::from_model_output(&reply).inspect_err(|e| {
            warn!(error = %e, "model reply did not parse");
        })?;
        result.period_analysis.total_calls = covered_calls(request);
        Ok(result)
    }
}

//! Collaborator interfaces consumed by the analysis engine
//!
//! Call storage, model invocation, and analysis persistence live outside this
//! crate; the engine sees them only through these traits.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{
    CallRecord, DateRange, RecordStoreError, SamplingInfo, SubjectId, SummarizerError,
    TrendAnalysisResult,
};

/// Records fetched for one subject and range
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<CallRecord>,
    pub count: usize,
}

impl RecordBatch {
    pub fn new(records: Vec<CallRecord>) -> Self {
        let count = records.len();
        Self { records, count }
    }
}

/// Source of graded call records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records for `subject` within `range`
    ///
    /// Unknown subjects fail with `NotFound`; a known subject with no calls in
    /// the range yields an empty batch.
    async fn fetch_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<RecordBatch, RecordStoreError>;

    /// Count-only variant used for previews
    async fn count_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<usize, RecordStoreError> {
        Ok(self.fetch_records(subject, range).await?.records.len())
    }
}

/// Which part of the record set a call-level request covers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CallScope {
    All,
    Sample(SamplingInfo),
    Chunk { index: usize, of: usize },
}

/// Stage-1 output for one chunk, tagged with the slice of the timeline it covers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSummary {
    pub index: usize,
    pub range: DateRange,
    pub call_count: usize,
    pub result: TrendAnalysisResult,
}

/// Input to one summarizer invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryRequest<'a> {
    /// Summarize call records directly
    Calls {
        subject: &'a SubjectId,
        range: &'a DateRange,
        scope: CallScope,
        calls: &'a [CallRecord],
    },
    /// Merge chunk summaries, earliest chunk first, into one synthesis
    Synthesis {
        subject: &'a SubjectId,
        range: &'a DateRange,
        total_calls: usize,
        chunks: &'a [ChunkSummary],
    },
}

/// Bounded-context analysis capability, usually a language model
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<TrendAnalysisResult, SummarizerError>;
}

/// Store of previously generated analyses
#[async_trait]
pub trait AnalysisHistory: Send + Sync {
    async fn latest(&self, subject: &SubjectId, range: &DateRange) -> Option<TrendAnalysisResult>;

    async fn record(&self, subject: &SubjectId, range: &DateRange, analysis: &TrendAnalysisResult);
}

/// History that remembers nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

#[async_trait]
impl AnalysisHistory for NoHistory {
    async fn latest(&self, _subject: &SubjectId, _range: &DateRange) -> Option<TrendAnalysisResult> {
        None
    }

    async fn record(&self, _subject: &SubjectId, _range: &DateRange, _analysis: &TrendAnalysisResult) {}
}

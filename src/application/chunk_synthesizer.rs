//! Hierarchical (map-reduce) synthesis for large record sets
//!
//! Stage 1 summarizes every chunk independently, up to `fan_out` at a time.
//! Stage 2 starts only once every chunk succeeded and merges the chunk
//! summaries in timeline order. A single failed chunk fails the whole run.

use futures_util::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::application::invocation::SummarizerInvoker;
use crate::application::ports::{CallScope, ChunkSummary, SummaryRequest};
use crate::domain::{
    AnalysisError, CallRecord, ChunkPlan, ChunkSize, DateRange, FanOut, HierarchicalInfo,
    SubjectId, TrendAnalysisResult,
};

#[derive(Clone)]
pub struct ChunkSynthesizer {
    invoker: SummarizerInvoker,
    chunk_size: ChunkSize,
    fan_out: FanOut,
}

impl ChunkSynthesizer {
    pub fn new(invoker: SummarizerInvoker, chunk_size: ChunkSize, fan_out: FanOut) -> Self {
        Self {
            invoker,
            chunk_size,
            fan_out,
        }
    }

    pub fn plan(&self, total: usize) -> ChunkPlan {
        ChunkPlan::new(total, self.chunk_size)
    }

    /// Summarize `records` (sorted oldest first) chunk by chunk, then merge
    #[instrument(skip(self, records, cancel), fields(record_count = records.len()))]
    pub async fn synthesize(
        &self,
        subject: &SubjectId,
        range: &DateRange,
        records: &[CallRecord],
        cancel: &CancellationToken,
    ) -> Result<(TrendAnalysisResult, HierarchicalInfo), AnalysisError> {
        let plan = self.plan(records.len());
        let chunk_count = plan.len();
        info!(chunk_count, "starting hierarchical synthesis");

        // `buffered` yields in submission order, and dropping the stream on the
        // first error drops every chunk call still in flight.
        let summaries: Vec<ChunkSummary> = stream::iter(plan.chunks().iter().cloned().enumerate())
            .map(|(index, bounds)| {
                let calls = &records[bounds];
                async move {
                    let request = SummaryRequest::Calls {
                        subject,
                        range,
                        scope: CallScope::Chunk {
                            index,
                            of: chunk_count,
                        },
                        calls,
                    };
                    let result = self.invoker.invoke(&request, cancel).await?;
                    debug!(chunk = index, calls = calls.len(), "chunk summarized");
                    Ok::<_, AnalysisError>(ChunkSummary {
                        index,
                        range: chunk_range(calls, range)?,
                        call_count: calls.len(),
                        result,
                    })
                }
            })
            .buffered(self.fan_out.into_inner())
            .try_collect()
            .await?;

        let synthesis = SummaryRequest::Synthesis {
            subject,
            range,
            total_calls: records.len(),
            chunks: &summaries,
        };
        let result = self.invoker.invoke(&synthesis, cancel).await?;

        let info = HierarchicalInfo {
            chunks_analyzed: summaries.len(),
            calls_per_chunk: summaries.iter().map(|s| s.call_count).collect(),
        };
        info!(chunks = info.chunks_analyzed, "hierarchical synthesis complete");
        Ok((result, info))
    }
}

/// The slice of time a chunk covers, from its first to its last call
fn chunk_range(calls: &[CallRecord], fallback: &DateRange) -> Result<DateRange, AnalysisError> {
    match (calls.first(), calls.last()) {
        (Some(first), Some(last)) => DateRange::try_new(first.occurred_at, last.occurred_at),
        _ => Ok(*fallback),
    }
}

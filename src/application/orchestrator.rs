//! Top-level trend analysis coordinator
//!
//! Picks an analysis tier from the size of the record set, runs the matching
//! strategy, and caches the resulting report per subject and range.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::application::cache::{AnalysisCache, CacheKey};
use crate::application::chunk_synthesizer::ChunkSynthesizer;
use crate::application::invocation::SummarizerInvoker;
use crate::application::ports::{
    AnalysisHistory, CallScope, NoHistory, RecordStore, Summarizer, SummaryRequest,
};
use crate::application::sampler::{Sampler, SamplingPolicy};
use crate::domain::call_record::sort_chronologically;
use crate::domain::{
    validate_periods, AnalysisError, AnalysisMetadata, AnalysisOutcome, AnalysisTier, CallRecord,
    ChunkSize, DateRange, FanOut, PeriodValidation, SampleTarget, SubjectId, TierThresholds,
    TrendAnalysisResult, TrendReport,
};

/// Tuning for the tiered pipeline
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    pub thresholds: TierThresholds,
    pub sample_target: SampleTarget,
    pub sampling: SamplingPolicy,
    pub chunk_size: ChunkSize,
    pub fan_out: FanOut,
    pub summarizer_timeout: std::time::Duration,
}

impl AnalysisConfig {
    /// Check cross-field constraints the individual types cannot express
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sample_target.into_inner() > self.thresholds.sample().into_inner() {
            return Err(AnalysisError::Configuration(format!(
                "sample target ({}) must not exceed the sample threshold ({})",
                self.sample_target,
                self.thresholds.sample()
            )));
        }
        if self.summarizer_timeout.is_zero() {
            return Err(AnalysisError::Configuration(
                "summarizer timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            thresholds: TierThresholds::default(),
            sample_target: SampleTarget::try_new(50).expect("Default sample target is valid"),
            sampling: SamplingPolicy::default(),
            chunk_size: ChunkSize::try_new(40).expect("Default chunk size is valid"),
            fan_out: FanOut::default(),
            summarizer_timeout: std::time::Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    pub force_refresh: bool,
}

impl AnalysisOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

pub struct TrendOrchestrator {
    config: AnalysisConfig,
    records: Arc<dyn RecordStore>,
    history: Arc<dyn AnalysisHistory>,
    cache: Arc<AnalysisCache>,
    invoker: SummarizerInvoker,
    sampler: Sampler,
    synthesizer: ChunkSynthesizer,
}

impl TrendOrchestrator {
    pub fn new(
        config: AnalysisConfig,
        records: Arc<dyn RecordStore>,
        summarizer: Arc<dyn Summarizer>,
        cache: Arc<AnalysisCache>,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let invoker = SummarizerInvoker::new(summarizer, config.summarizer_timeout);
        Ok(Self {
            config,
            records,
            history: Arc::new(NoHistory),
            cache,
            sampler: Sampler::new(config.sampling),
            synthesizer: ChunkSynthesizer::new(invoker.clone(), config.chunk_size, config.fan_out),
            invoker,
        })
    }

    pub fn with_history(mut self, history: Arc<dyn AnalysisHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Tier a record count would be analyzed with
    pub fn predict_tier(&self, record_count: usize) -> AnalysisTier {
        self.config.thresholds.select_tier(record_count)
    }

    /// Trend report for `subject` over `range`
    ///
    /// Identical plain requests are answered from the cache; concurrent ones
    /// share a single computation.
    #[instrument(
        skip_all,
        fields(subject = %subject, range = %range, force_refresh = options.force_refresh)
    )]
    pub async fn get_trend_analysis(
        &self,
        subject: &SubjectId,
        range: &DateRange,
        options: AnalysisOptions,
    ) -> Result<Arc<TrendReport>, AnalysisError> {
        let key = CacheKey::new(subject.clone(), *range);
        self.cache
            .get_or_compute(key, options.force_refresh, |cancel| {
                self.compute(subject, range, options, cancel)
            })
            .await
    }

    pub fn validate_periods(&self, period_a: &DateRange, period_b: &DateRange) -> PeriodValidation {
        validate_periods(period_a, period_b)
    }

    /// Cheap count used to predict the tier before committing to a full run
    #[instrument(skip_all, fields(subject = %subject, range = %range))]
    pub async fn preview_record_count(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<usize, AnalysisError> {
        Ok(self.records.count_records(subject, range).await?)
    }

    async fn compute(
        &self,
        subject: &SubjectId,
        range: &DateRange,
        options: AnalysisOptions,
        cancel: CancellationToken,
    ) -> Result<TrendReport, AnalysisError> {
        if !options.force_refresh {
            if let Some(analysis) = self.history.latest(subject, range).await {
                info!("serving persisted analysis");
                return Ok(self.report(subject, range, AnalysisOutcome::FromHistory { analysis }));
            }
        }

        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            batch = self.records.fetch_records(subject, range) => batch?,
        };
        if batch.count != batch.records.len() {
            warn!(
                reported = batch.count,
                fetched = batch.records.len(),
                "record store count disagrees with payload; using payload"
            );
        }

        let mut records = batch.records;
        if records.is_empty() {
            info!("no calls in range");
            return Ok(self.report(subject, range, AnalysisOutcome::empty()));
        }
        sort_chronologically(&mut records);

        let tier = self.predict_tier(records.len());
        info!(%tier, record_count = records.len(), "dispatching analysis");

        let (analysis, metadata) = match tier {
            AnalysisTier::Direct => {
                let analysis = self
                    .summarize_calls(subject, range, CallScope::All, &records, &cancel)
                    .await?;
                (analysis, AnalysisMetadata::direct(records.len()))
            }
            AnalysisTier::Sampled => {
                let (subset, info) = self.sampler.sample(&records, self.config.sample_target);
                let analysis = self
                    .summarize_calls(subject, range, CallScope::Sample(info.clone()), &subset, &cancel)
                    .await?;
                (analysis, AnalysisMetadata::sampled(info))
            }
            AnalysisTier::Hierarchical => {
                let (analysis, info) = self
                    .synthesizer
                    .synthesize(subject, range, &records, &cancel)
                    .await?;
                (analysis, AnalysisMetadata::hierarchical(records.len(), info))
            }
        };

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        self.history.record(subject, range, &analysis).await;

        Ok(self.report(subject, range, AnalysisOutcome::Fresh { analysis, metadata }))
    }

    async fn summarize_calls(
        &self,
        subject: &SubjectId,
        range: &DateRange,
        scope: CallScope,
        calls: &[CallRecord],
        cancel: &CancellationToken,
    ) -> Result<TrendAnalysisResult, AnalysisError> {
        let request = SummaryRequest::Calls {
            subject,
            range,
            scope,
            calls,
        };
        self.invoker.invoke(&request, cancel).await
    }

    fn report(&self, subject: &SubjectId, range: &DateRange, outcome: AnalysisOutcome) -> TrendReport {
        TrendReport {
            subject: subject.clone(),
            range: *range,
            generated_at: Utc::now(),
            outcome,
        }
    }
}

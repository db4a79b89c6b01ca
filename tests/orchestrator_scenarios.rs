//! End-to-end scenarios for the tiered trend analysis pipeline
//!
//! A counting record store and a scripted summarizer stand in for the real
//! collaborators, so tests can assert on how often each was consulted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_test::{assert_err, assert_ok};
use trend_coach::application::{
    AnalysisCache, AnalysisConfig, AnalysisHistory, AnalysisOptions, CallScope, RecordBatch,
    RecordStore, Summarizer, SummaryRequest, TrendOrchestrator,
};
use trend_coach::domain::analysis::NO_DATA_MESSAGE;
use trend_coach::domain::{
    AnalysisError, AnalysisOutcome, AnalysisTier, CallRecord, DateRange, HeatScore,
    PeriodAnalysis, RecordStoreError, SamplingStrategy, ScoreTrend, SubjectId, SummarizerError,
    TrendAnalysisResult,
};
use trend_coach::infrastructure::InMemoryRecordStore;

struct CountingStore {
    inner: InMemoryRecordStore,
    fetches: AtomicUsize,
}

impl CountingStore {
    fn with_records(subject: &SubjectId, records: Vec<CallRecord>) -> Arc<Self> {
        let inner = InMemoryRecordStore::new();
        inner.add_subject(subject.clone());
        inner.extend(subject.clone(), records);
        Arc::new(Self {
            inner,
            fetches: AtomicUsize::new(0),
        })
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn fetch_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<RecordBatch, RecordStoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_records(subject, range).await
    }

    async fn count_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<usize, RecordStoreError> {
        self.inner.count_records(subject, range).await
    }
}

/// Answers every request with "run N" after `delay`; can fail one chunk
#[derive(Default)]
struct ScriptedSummarizer {
    delay: Duration,
    calls: AtomicUsize,
    fail_chunk: Option<usize>,
    scopes: Mutex<Vec<String>>,
}

impl ScriptedSummarizer {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn result(summary: String, total_calls: usize) -> TrendAnalysisResult {
    TrendAnalysisResult {
        summary,
        period_analysis: PeriodAnalysis {
            total_calls,
            average_score: None,
            score_trend: ScoreTrend::Stable,
        },
        strengths: vec![],
        improvements: vec![],
        coaching_focus: vec![],
        recurring_patterns: vec![],
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<TrendAnalysisResult, SummarizerError> {
        let run = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        match request {
            SummaryRequest::Calls { scope, calls, .. } => {
                self.scopes.lock().push(format!("{scope:?}"));
                if let CallScope::Chunk { index, .. } = scope {
                    if self.fail_chunk == Some(*index) {
                        return Err(SummarizerError::Upstream("rate limited".to_string()));
                    }
                }
                Ok(result(format!("run {run}"), calls.len()))
            }
            SummaryRequest::Synthesis { total_calls, .. } => {
                self.scopes.lock().push("synthesis".to_string());
                Ok(result(format!("run {run}"), *total_calls))
            }
        }
    }
}

#[derive(Default)]
struct MemoryHistory {
    entries: Mutex<HashMap<(SubjectId, DateRange), TrendAnalysisResult>>,
}

#[async_trait]
impl AnalysisHistory for MemoryHistory {
    async fn latest(&self, subject: &SubjectId, range: &DateRange) -> Option<TrendAnalysisResult> {
        self.entries.lock().get(&(subject.clone(), *range)).cloned()
    }

    async fn record(&self, subject: &SubjectId, range: &DateRange, analysis: &TrendAnalysisResult) {
        self.entries
            .lock()
            .insert((subject.clone(), *range), analysis.clone());
    }
}

fn subject() -> SubjectId {
    SubjectId::try_new("rep-42".to_string()).unwrap()
}

fn june() -> DateRange {
    DateRange::whole_days(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap()
}

/// `count` calls spread over June, scores cycling between 30 and 90
fn june_calls(count: usize) -> Vec<CallRecord> {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let step = (29 * 24 * 60) / count.max(1) as i64;
    (0..count)
        .map(|i| {
            CallRecord::new(start + ChronoDuration::minutes(i as i64 * step))
                .with_heat_score(HeatScore::try_new(30.0 + (i % 7) as f64 * 10.0).unwrap())
        })
        .collect()
}

fn orchestrator(
    store: Arc<CountingStore>,
    summarizer: Arc<ScriptedSummarizer>,
) -> Arc<TrendOrchestrator> {
    Arc::new(
        TrendOrchestrator::new(
            AnalysisConfig::default(),
            store,
            summarizer,
            Arc::new(AnalysisCache::default()),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn small_range_runs_direct_without_tier_details() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let orchestrator = orchestrator(store, summarizer.clone());

    let report = assert_ok!(
        orchestrator
            .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
            .await
    );

    let metadata = report.outcome.metadata().unwrap();
    assert_eq!(metadata.tier(), AnalysisTier::Direct);
    assert_eq!(metadata.total_calls, 5);
    assert!(metadata.sampling_info().is_none());
    assert!(metadata.hierarchical_info().is_none());
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn medium_range_is_sampled_down_to_target() {
    let store = CountingStore::with_records(&subject(), june_calls(90));
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let orchestrator = orchestrator(store, summarizer.clone());

    let report = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();

    let metadata = report.outcome.metadata().unwrap();
    assert_eq!(metadata.tier(), AnalysisTier::Sampled);
    assert_eq!(metadata.total_calls, 90);
    let info = metadata.sampling_info().unwrap();
    assert_eq!(info.original_count, 90);
    assert_eq!(info.sampled_count, 50);
    assert_eq!(info.strategy, SamplingStrategy::TemporalStratifiedWithExtremes);
    assert!(metadata.hierarchical_info().is_none());
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn large_range_is_synthesized_from_four_chunks() {
    let store = CountingStore::with_records(&subject(), june_calls(150));
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let orchestrator = orchestrator(store, summarizer.clone());

    let report = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();

    let metadata = report.outcome.metadata().unwrap();
    assert_eq!(metadata.tier(), AnalysisTier::Hierarchical);
    let info = metadata.hierarchical_info().unwrap();
    assert_eq!(info.chunks_analyzed, 4);
    assert_eq!(info.calls_per_chunk, vec![40, 40, 40, 30]);
    assert_eq!(info.calls_per_chunk.iter().sum::<usize>(), 150);
    assert!(metadata.sampling_info().is_none());
    assert_eq!(summarizer.calls(), 5);
    assert_eq!(summarizer.scopes.lock().last().map(String::as_str), Some("synthesis"));
}

#[tokio::test]
async fn repeated_requests_are_served_from_cache() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let orchestrator = orchestrator(store.clone(), summarizer.clone());

    let first = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    let second = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.fetches(), 1);
    assert_eq!(summarizer.calls(), 1);
}

#[tokio::test]
async fn concurrent_identical_requests_share_one_run() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let orchestrator = orchestrator(store.clone(), summarizer.clone());

    let subject = subject();
    let range = june();
    let (a, b) = tokio::join!(
        orchestrator.get_trend_analysis(&subject, &range, AnalysisOptions::default()),
        orchestrator.get_trend_analysis(&subject, &range, AnalysisOptions::default()),
    );

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(store.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn force_refresh_overwrites_and_is_shared_with_concurrent_readers() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer {
        delay: Duration::from_secs(2),
        ..Default::default()
    });
    let orchestrator = orchestrator(store.clone(), summarizer.clone());

    let cached = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    assert_eq!(cached.outcome.analysis().unwrap().summary, "run 1");

    let refreshing = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .get_trend_analysis(&subject(), &june(), AnalysisOptions::refresh())
                .await
        })
    };
    // Let the refresh get to the summarizer before the plain request arrives.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let concurrent = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    let refreshed = refreshing.await.unwrap().unwrap();

    assert_eq!(store.fetches(), 2);
    assert_eq!(refreshed.outcome.analysis().unwrap().summary, "run 2");
    assert!(Arc::ptr_eq(&concurrent, &refreshed));

    let afterwards = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&afterwards, &refreshed));
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn empty_range_is_informational_not_an_error() {
    let store = CountingStore::with_records(&subject(), vec![]);
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let orchestrator = orchestrator(store, summarizer.clone());

    let report = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        AnalysisOutcome::Empty {
            message: NO_DATA_MESSAGE.to_string()
        }
    );
    assert_eq!(report.outcome.tier(), Some(AnalysisTier::Direct));
    assert!(report.outcome.metadata().is_none());
    assert_eq!(summarizer.calls(), 0);
}

#[tokio::test]
async fn unknown_subject_is_not_found() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let orchestrator = orchestrator(store, Arc::new(ScriptedSummarizer::default()));
    let stranger = SubjectId::try_new("rep-404".to_string()).unwrap();

    let error = assert_err!(
        orchestrator
            .get_trend_analysis(&stranger, &june(), AnalysisOptions::default())
            .await
    );

    assert_eq!(error, AnalysisError::NotFound { subject: stranger });
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn failed_chunk_fails_the_run_and_is_retryable() {
    let store = CountingStore::with_records(&subject(), june_calls(150));
    let summarizer = Arc::new(ScriptedSummarizer {
        fail_chunk: Some(2),
        ..Default::default()
    });
    let orchestrator = orchestrator(store.clone(), summarizer.clone());

    let error = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap_err();

    assert!(error.is_retryable());
    assert!(!summarizer.scopes.lock().iter().any(|s| s == "synthesis"));

    // Failures are not cached; the retry goes back to the store.
    let _ = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await;
    assert_eq!(store.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_summarizer_times_out() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer {
        delay: Duration::from_secs(600),
        ..Default::default()
    });
    let orchestrator = orchestrator(store, summarizer);

    let error = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap_err();

    assert_eq!(error, AnalysisError::UpstreamTimeout(Duration::from_secs(60)));
}

#[tokio::test]
async fn persisted_analysis_is_reused_unless_forced() {
    let store = CountingStore::with_records(&subject(), june_calls(5));
    let summarizer = Arc::new(ScriptedSummarizer::default());
    let history = Arc::new(MemoryHistory::default());
    let orchestrator = TrendOrchestrator::new(
        AnalysisConfig::default(),
        store.clone(),
        summarizer.clone(),
        Arc::new(AnalysisCache::default()),
    )
    .unwrap()
    .with_history(history.clone());

    let fresh = orchestrator
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    assert!(matches!(fresh.outcome, AnalysisOutcome::Fresh { .. }));

    // A second orchestrator with a cold cache finds the persisted analysis.
    let restarted = TrendOrchestrator::new(
        AnalysisConfig::default(),
        store.clone(),
        summarizer.clone(),
        Arc::new(AnalysisCache::default()),
    )
    .unwrap()
    .with_history(history);

    let loaded = restarted
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::default())
        .await
        .unwrap();
    assert!(matches!(loaded.outcome, AnalysisOutcome::FromHistory { .. }));
    assert!(loaded.outcome.metadata().is_none());
    assert_eq!(loaded.outcome.total_calls(), 5);
    assert_eq!(store.fetches(), 1);

    let forced = restarted
        .get_trend_analysis(&subject(), &june(), AnalysisOptions::refresh())
        .await
        .unwrap();
    assert!(matches!(forced.outcome, AnalysisOutcome::Fresh { .. }));
    assert_eq!(store.fetches(), 2);
}

#[tokio::test]
async fn preview_counts_without_fetching() {
    let store = CountingStore::with_records(&subject(), june_calls(130));
    let orchestrator = orchestrator(store.clone(), Arc::new(ScriptedSummarizer::default()));

    let count = orchestrator
        .preview_record_count(&subject(), &june())
        .await
        .unwrap();

    assert_eq!(count, 130);
    assert_eq!(orchestrator.predict_tier(count), AnalysisTier::Hierarchical);
    assert_eq!(store.fetches(), 0);
}

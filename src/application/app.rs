use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument};

use crate::application::cache::AnalysisCache;
use crate::application::comparison::ComparisonSession;
use crate::application::debounce::RangeDebouncer;
use crate::application::orchestrator::{AnalysisOptions, TrendOrchestrator};
use crate::application::ports::{RecordStore, Summarizer};
use crate::config::Settings;
use crate::domain::{AnalysisError, DateRange, PeriodValidation, SubjectId, TrendReport};
use crate::infrastructure::{JsonFileRecordStore, StatisticalSummarizer};
use crate::Result;

/// One primary analysis, optionally compared against a second period
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub subject: SubjectId,
    pub primary: DateRange,
    pub comparison: Option<DateRange>,
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutput {
    pub validation: PeriodValidation,
    pub report: TrendReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutput {
    pub primary: TrendReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonOutput>,
}

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    orchestrator: Arc<TrendOrchestrator>,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        let settings = Settings::new()?;
        Self::from_settings(settings).await
    }

    /// Wire the JSON record file and the offline summarizer
    #[instrument(skip_all)]
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        info!("Loading call records from {}", settings.records.path.display());
        let records = JsonFileRecordStore::open(&settings.records.path).await?;
        Self::with_collaborators(
            settings,
            Arc::new(records),
            Arc::new(StatisticalSummarizer::default()),
        )
    }

    pub fn with_collaborators(
        settings: Settings,
        records: Arc<dyn RecordStore>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self> {
        let config = settings.analysis_config()?;
        let cache = Arc::new(AnalysisCache::new(settings.cache_config()));
        let orchestrator = Arc::new(TrendOrchestrator::new(config, records, summarizer, cache)?);
        Ok(Self {
            settings,
            orchestrator,
        })
    }

    /// Run the primary analysis and, if requested, the comparison next to it
    ///
    /// Identical periods are rejected before any analysis starts.
    #[instrument(skip_all, fields(subject = %request.subject, primary = %request.primary))]
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisOutput> {
        let validation = request
            .comparison
            .map(|comparison| self.orchestrator.validate_periods(&comparison, &request.primary));
        if let Some(validation) = validation.as_ref().filter(|v| v.blocks_execution()) {
            let message = validation
                .warnings
                .iter()
                .map(|w| w.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AnalysisError::Validation(message).into());
        }

        let primary = self.orchestrator.get_trend_analysis(
            &request.subject,
            &request.primary,
            request.options,
        );
        let output = match (request.comparison, validation) {
            (Some(range), Some(validation)) => {
                let comparison = self.orchestrator.get_trend_analysis(
                    &request.subject,
                    &range,
                    AnalysisOptions::default(),
                );
                let (primary, comparison) = tokio::try_join!(primary, comparison)?;
                AnalysisOutput {
                    primary: (*primary).clone(),
                    comparison: Some(ComparisonOutput {
                        validation,
                        report: (*comparison).clone(),
                    }),
                }
            }
            _ => AnalysisOutput {
                primary: (*primary.await?).clone(),
                comparison: None,
            },
        };

        info!(
            primary_calls = output.primary.outcome.total_calls(),
            compared = output.comparison.is_some(),
            "analysis complete"
        );
        Ok(output)
    }

    /// Interactive session for one subject
    pub fn session(&self, subject: SubjectId) -> ComparisonSession {
        ComparisonSession::new(subject, Arc::clone(&self.orchestrator))
    }

    /// Input buffer for range edits, using the configured delay
    pub fn debouncer(&self) -> (RangeDebouncer, mpsc::Receiver<DateRange>) {
        RangeDebouncer::spawn(self.settings.debounce_delay())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn orchestrator(&self) -> &Arc<TrendOrchestrator> {
        &self.orchestrator
    }
}

//! Primary/comparison analysis workflow
//!
//! [`ComparisonController`] is a synchronous state machine. It consumes
//! committed ranges and user actions, and answers with [`Effect`]s describing
//! the I/O to perform. Results come back through the `*_completed` methods;
//! a completion for a range that is no longer current is dropped.
//!
//! The primary arm runs on every committed range. The comparison arm runs
//! only after an explicit confirm, and never while the two periods are
//! identical.
//!
//! [`ComparisonSession`] executes the effects against a [`TrendOrchestrator`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::application::orchestrator::{AnalysisOptions, TrendOrchestrator};
use crate::domain::{
    validate_periods, AnalysisError, AnalysisTier, DateRange, PeriodValidation, QuickFix,
    SubjectId, TrendReport,
};
use crate::error::{Error, Result};

/// How the comparison range is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonPreset {
    /// Same length as the primary range, ending the day before it starts
    PreviousPeriod,
    /// Chosen explicitly; left alone when the primary range moves
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComparisonSetup {
    pub range: DateRange,
    pub preset: ComparisonPreset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryState {
    Idle,
    Pending {
        range: DateRange,
    },
    Ready {
        range: DateRange,
        report: Arc<TrendReport>,
    },
    Failed {
        range: DateRange,
        error: AnalysisError,
    },
}

impl PrimaryState {
    pub fn range(&self) -> Option<DateRange> {
        match self {
            Self::Idle => None,
            Self::Pending { range } | Self::Ready { range, .. } | Self::Failed { range, .. } => {
                Some(*range)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonState {
    Off,
    /// Range chosen, waiting for the user to confirm
    Staged(ComparisonSetup),
    /// Analysis requested for the confirmed range
    Confirmed(ComparisonSetup),
    Ready {
        setup: ComparisonSetup,
        report: Arc<TrendReport>,
    },
    Failed {
        setup: ComparisonSetup,
        error: AnalysisError,
    },
}

impl ComparisonState {
    pub fn setup(&self) -> Option<ComparisonSetup> {
        match self {
            Self::Off => None,
            Self::Staged(setup) | Self::Confirmed(setup) => Some(*setup),
            Self::Ready { setup, .. } | Self::Failed { setup, .. } => Some(*setup),
        }
    }

    pub fn is_on(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Record count and predicted tier for the current primary range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPreview {
    pub range: DateRange,
    pub record_count: usize,
    pub tier: AnalysisTier,
}

/// I/O requested by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    PreviewCount { range: DateRange },
    RunPrimary { range: DateRange, force_refresh: bool },
    RunComparison { range: DateRange },
}

#[derive(Debug, Clone)]
pub struct ComparisonController {
    primary: PrimaryState,
    comparison: ComparisonState,
    preview: Option<RecordPreview>,
}

impl Default for ComparisonController {
    fn default() -> Self {
        Self::new()
    }
}

impl ComparisonController {
    pub fn new() -> Self {
        Self {
            primary: PrimaryState::Idle,
            comparison: ComparisonState::Off,
            preview: None,
        }
    }

    pub fn primary(&self) -> &PrimaryState {
        &self.primary
    }

    pub fn comparison(&self) -> &ComparisonState {
        &self.comparison
    }

    pub fn preview(&self) -> Option<&RecordPreview> {
        self.preview.as_ref()
    }

    /// Fresh validation of comparison (period A) against primary (period B)
    pub fn validation(&self) -> Option<PeriodValidation> {
        let primary = self.primary.range()?;
        let setup = self.comparison.setup()?;
        Some(validate_periods(&setup.range, &primary))
    }

    pub fn can_confirm(&self) -> bool {
        matches!(
            self.comparison,
            ComparisonState::Staged(_) | ComparisonState::Failed { .. }
        ) && self
            .validation()
            .is_some_and(|validation| !validation.blocks_execution())
    }

    /// A new primary range was committed
    ///
    /// Drops the loaded primary result. With the previous-period preset the
    /// comparison range follows the new primary range; either way the
    /// comparison goes back to staged and needs a new confirm.
    pub fn commit_primary_range(&mut self, range: DateRange) -> Vec<Effect> {
        self.primary = PrimaryState::Pending { range };
        self.preview = None;

        if let Some(mut setup) = self.comparison.setup() {
            if setup.preset == ComparisonPreset::PreviousPeriod {
                setup.range = range.preceding();
            }
            self.comparison = ComparisonState::Staged(setup);
        }

        vec![
            Effect::PreviewCount { range },
            Effect::RunPrimary {
                range,
                force_refresh: false,
            },
        ]
    }

    pub fn enable_comparison(&mut self) -> Result<()> {
        if self.comparison.is_on() {
            return Ok(());
        }
        let primary = self
            .primary
            .range()
            .ok_or_else(|| Error::invalid_transition("comparison needs a primary range first"))?;
        self.comparison = ComparisonState::Staged(ComparisonSetup {
            range: primary.preceding(),
            preset: ComparisonPreset::PreviousPeriod,
        });
        Ok(())
    }

    pub fn disable_comparison(&mut self) {
        self.comparison = ComparisonState::Off;
    }

    pub fn set_comparison_range(&mut self, range: DateRange) -> Result<()> {
        if !self.comparison.is_on() {
            return Err(Error::invalid_transition("comparison mode is off"));
        }
        self.comparison = ComparisonState::Staged(ComparisonSetup {
            range,
            preset: ComparisonPreset::Custom,
        });
        Ok(())
    }

    /// Rewrite the comparison range with one of the validator's fixes
    pub fn apply_quick_fix(&mut self, fix: QuickFix) -> Result<()> {
        let (Some(primary), Some(setup)) = (self.primary.range(), self.comparison.setup()) else {
            return Err(Error::invalid_transition(
                "quick fixes need both a primary and a comparison range",
            ));
        };
        let preset = match fix {
            QuickFix::UsePreviousPeriod => ComparisonPreset::PreviousPeriod,
            QuickFix::ShiftPeriodA | QuickFix::MatchDuration => ComparisonPreset::Custom,
        };
        self.comparison = ComparisonState::Staged(ComparisonSetup {
            range: fix.apply(&setup.range, &primary),
            preset,
        });
        Ok(())
    }

    /// The only way the comparison analysis gets started
    pub fn confirm_comparison(&mut self) -> Result<Vec<Effect>> {
        let setup = match &self.comparison {
            ComparisonState::Staged(setup) | ComparisonState::Failed { setup, .. } => *setup,
            other => {
                return Err(Error::invalid_transition(format!(
                    "cannot confirm comparison from {}",
                    state_name(other)
                )))
            }
        };
        let validation = self
            .validation()
            .ok_or_else(|| Error::invalid_transition("comparison needs a primary range first"))?;
        if validation.blocks_execution() {
            let message = validation
                .warnings
                .iter()
                .max_by_key(|w| w.severity)
                .map(|w| w.message.clone())
                .unwrap_or_default();
            return Err(AnalysisError::Validation(message).into());
        }

        self.comparison = ComparisonState::Confirmed(setup);
        Ok(vec![Effect::RunComparison { range: setup.range }])
    }

    /// Re-run the primary analysis, bypassing the cache
    pub fn refresh(&mut self) -> Result<Vec<Effect>> {
        let range = self
            .primary
            .range()
            .ok_or_else(|| Error::invalid_transition("nothing to refresh"))?;
        self.primary = PrimaryState::Pending { range };
        Ok(vec![Effect::RunPrimary {
            range,
            force_refresh: true,
        }])
    }

    /// Returns false when the completion was stale and ignored
    pub fn primary_completed(
        &mut self,
        range: DateRange,
        result: std::result::Result<Arc<TrendReport>, AnalysisError>,
    ) -> bool {
        if self.primary != (PrimaryState::Pending { range }) {
            debug!(%range, "ignoring stale primary result");
            return false;
        }
        self.primary = match result {
            Ok(report) => PrimaryState::Ready { range, report },
            Err(error) => PrimaryState::Failed { range, error },
        };
        true
    }

    pub fn comparison_completed(
        &mut self,
        range: DateRange,
        result: std::result::Result<Arc<TrendReport>, AnalysisError>,
    ) -> bool {
        let setup = match &self.comparison {
            ComparisonState::Confirmed(setup) if setup.range == range => *setup,
            _ => {
                debug!(%range, "ignoring stale comparison result");
                return false;
            }
        };
        self.comparison = match result {
            Ok(report) => ComparisonState::Ready { setup, report },
            Err(error) => ComparisonState::Failed { setup, error },
        };
        true
    }

    pub fn preview_completed(&mut self, range: DateRange, record_count: usize, tier: AnalysisTier) -> bool {
        if self.primary.range() != Some(range) {
            return false;
        }
        self.preview = Some(RecordPreview {
            range,
            record_count,
            tier,
        });
        true
    }
}

fn state_name(state: &ComparisonState) -> &'static str {
    match state {
        ComparisonState::Off => "off",
        ComparisonState::Staged(_) => "staged",
        ComparisonState::Confirmed(_) => "confirmed",
        ComparisonState::Ready { .. } => "ready",
        ComparisonState::Failed { .. } => "failed",
    }
}

/// Runs a [`ComparisonController`] against the orchestrator for one subject
pub struct ComparisonSession {
    subject: SubjectId,
    orchestrator: Arc<TrendOrchestrator>,
    controller: ComparisonController,
}

impl ComparisonSession {
    pub fn new(subject: SubjectId, orchestrator: Arc<TrendOrchestrator>) -> Self {
        Self {
            subject,
            orchestrator,
            controller: ComparisonController::new(),
        }
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn controller(&self) -> &ComparisonController {
        &self.controller
    }

    pub async fn commit_primary_range(&mut self, range: DateRange) {
        let effects = self.controller.commit_primary_range(range);
        self.execute(effects).await;
    }

    /// Apply committed ranges until the channel closes
    pub async fn follow(&mut self, committed: &mut mpsc::Receiver<DateRange>) {
        while let Some(range) = committed.recv().await {
            self.commit_primary_range(range).await;
        }
    }

    pub fn enable_comparison(&mut self) -> Result<()> {
        self.controller.enable_comparison()
    }

    pub fn disable_comparison(&mut self) {
        self.controller.disable_comparison();
    }

    pub fn set_comparison_range(&mut self, range: DateRange) -> Result<()> {
        self.controller.set_comparison_range(range)
    }

    pub fn apply_quick_fix(&mut self, fix: QuickFix) -> Result<()> {
        self.controller.apply_quick_fix(fix)
    }

    pub async fn confirm_comparison(&mut self) -> Result<()> {
        let effects = self.controller.confirm_comparison()?;
        self.execute(effects).await;
        Ok(())
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let effects = self.controller.refresh()?;
        self.execute(effects).await;
        Ok(())
    }

    #[instrument(skip_all, fields(subject = %self.subject))]
    async fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PreviewCount { range } => {
                    match self
                        .orchestrator
                        .preview_record_count(&self.subject, &range)
                        .await
                    {
                        Ok(count) => {
                            let tier = self.orchestrator.predict_tier(count);
                            self.controller.preview_completed(range, count, tier);
                        }
                        // The full run reports the same failure; the preview is advisory.
                        Err(error) => warn!(%range, %error, "record preview failed"),
                    }
                }
                Effect::RunPrimary {
                    range,
                    force_refresh,
                } => {
                    let result = self
                        .orchestrator
                        .get_trend_analysis(&self.subject, &range, AnalysisOptions { force_refresh })
                        .await;
                    self.controller.primary_completed(range, result);
                }
                Effect::RunComparison { range } => {
                    info!(%range, "running comparison analysis");
                    let result = self
                        .orchestrator
                        .get_trend_analysis(&self.subject, &range, AnalysisOptions::default())
                        .await;
                    self.controller.comparison_completed(range, result);
                }
            }
        }
    }
}

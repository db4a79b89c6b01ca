//! Validation of a baseline/recent period pair before comparing them
//!
//! `period_a` is always the earlier baseline and `period_b` the recent period
//! it is compared against. Three independent checks run on every call:
//!
//! - identical ranges: a blocking error, a period compared with itself says
//!   nothing
//! - overlapping ranges: advisory, calls in the overlap are counted twice
//! - mismatched lengths: advisory, totals are not comparable
//!
//! Each warning may carry a [`QuickFix`] that mechanically repairs period A.

use serde::{Deserialize, Serialize};

use crate::domain::date_range::DateRange;

/// Length difference (in days) that is always tolerated
pub const DURATION_TOLERANCE_DAYS: i64 = 7;

/// Length difference, relative to the shorter period, that is tolerated
pub const DURATION_TOLERANCE_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Mechanical repair for period A
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuickFix {
    /// Move A to end the day before B starts, keeping A's length
    ShiftPeriodA,
    /// Keep A's end and stretch or shrink its start to B's length
    MatchDuration,
    /// Replace A with the period immediately preceding B
    UsePreviousPeriod,
}

impl QuickFix {
    /// The corrected period A
    pub fn apply(self, period_a: &DateRange, period_b: &DateRange) -> DateRange {
        match self {
            Self::ShiftPeriodA => {
                DateRange::ending_day_before(period_b, period_a.to(), period_a.span())
            }
            Self::MatchDuration => period_a.with_span_ending_at_to(period_b.span()),
            Self::UsePreviousPeriod => period_b.preceding(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub quick_fix: Option<QuickFix>,
}

/// Result of comparing two periods; computed on demand, never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodValidation {
    pub has_overlap: bool,
    pub overlap_days: i64,
    pub is_identical: bool,
    pub period_a_days: i64,
    pub period_b_days: i64,
    pub days_difference: i64,
    pub warnings: Vec<ValidationWarning>,
}

impl PeriodValidation {
    /// Whether any warning must be resolved before running the comparison
    pub fn blocks_execution(&self) -> bool {
        self.warnings
            .iter()
            .any(|warning| warning.severity == Severity::Error)
    }

    pub fn quick_fixes(&self) -> impl Iterator<Item = QuickFix> + '_ {
        self.warnings.iter().filter_map(|warning| warning.quick_fix)
    }
}

pub fn validate_periods(period_a: &DateRange, period_b: &DateRange) -> PeriodValidation {
    let period_a_days = period_a.days();
    let period_b_days = period_b.days();
    let days_difference = (period_a_days - period_b_days).abs();
    let is_identical = period_a == period_b;

    let mut warnings = Vec::new();
    let mut has_overlap = false;
    let mut overlap_days = 0;

    if is_identical {
        warnings.push(ValidationWarning {
            severity: Severity::Error,
            message: "Both periods are identical; pick a different comparison period.".to_string(),
            quick_fix: Some(QuickFix::UsePreviousPeriod),
        });
    } else if let Some(overlap) = period_a.intersection(period_b) {
        has_overlap = true;
        overlap_days = overlap.days();
        warnings.push(ValidationWarning {
            severity: Severity::Warning,
            message: format!(
                "The periods overlap by {overlap_days} day(s); calls in the overlap are counted in both."
            ),
            quick_fix: Some(QuickFix::ShiftPeriodA),
        });
    }

    let shorter = period_a_days.min(period_b_days) as f64;
    if days_difference > DURATION_TOLERANCE_DAYS
        && days_difference as f64 > DURATION_TOLERANCE_RATIO * shorter
    {
        warnings.push(ValidationWarning {
            severity: Severity::Info,
            message: format!(
                "The periods differ in length by {days_difference} days ({period_a_days} vs {period_b_days}); totals may not be comparable."
            ),
            quick_fix: Some(QuickFix::MatchDuration),
        });
    }

    PeriodValidation {
        has_overlap,
        overlap_days,
        is_identical,
        period_a_days,
        period_b_days,
        days_difference,
        warnings,
    }
}

//! Trend analysis results and the metadata describing how they were produced

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::date_range::DateRange;
use crate::domain::errors::SummarizerError;
use crate::domain::tier::AnalysisTier;
use crate::domain::types::SubjectId;

/// Message carried by the empty outcome
pub const NO_DATA_MESSAGE: &str = "No calls were recorded in this date range.";

/// Heat-score movement points within which a trend counts as stable
pub const DEFAULT_STABILITY_POINTS: f64 = 3.0;

/// Direction of the heat score across a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTrend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl ScoreTrend {
    /// Trend from an earlier and a later average score
    pub fn from_scores(earlier: Option<f64>, later: Option<f64>, stability_points: f64) -> Self {
        match (earlier, later) {
            (Some(earlier), Some(later)) => {
                let change = later - earlier;
                if change.abs() <= stability_points {
                    Self::Stable
                } else if change > 0.0 {
                    Self::Improving
                } else {
                    Self::Declining
                }
            }
            _ => Self::InsufficientData,
        }
    }
}

impl fmt::Display for ScoreTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Declining => write!(f, "declining"),
            Self::Stable => write!(f, "stable"),
            Self::InsufficientData => write!(f, "insufficient data"),
        }
    }
}

/// Aggregate numbers for the analyzed period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodAnalysis {
    pub total_calls: usize,
    #[serde(default)]
    pub average_score: Option<f64>,
    pub score_trend: ScoreTrend,
}

/// Structured synthesis returned by the summarizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAnalysisResult {
    pub summary: String,
    pub period_analysis: PeriodAnalysis,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub coaching_focus: Vec<String>,
    #[serde(default)]
    pub recurring_patterns: Vec<String>,
}

impl TrendAnalysisResult {
    /// Parse a model's JSON answer, tolerating a surrounding Markdown code fence
    pub fn from_model_output(raw: &str) -> Result<Self, SummarizerError> {
        let payload = strip_code_fence(raw);
        let parsed: Self = serde_json::from_str(payload)
            .map_err(|e| SummarizerError::MalformedOutput(e.to_string()))?;
        if parsed.summary.trim().is_empty() {
            return Err(SummarizerError::MalformedOutput(
                "summary is empty".to_string(),
            ));
        }
        Ok(parsed)
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Strategy used by the sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    TemporalStratifiedWithExtremes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingInfo {
    pub original_count: usize,
    pub sampled_count: usize,
    pub strategy: SamplingStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalInfo {
    pub chunks_analyzed: usize,
    pub calls_per_chunk: Vec<usize>,
}

/// Tier-specific detail; the variant always matches the tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum TierDetail {
    Direct,
    Sampled(SamplingInfo),
    Hierarchical(HierarchicalInfo),
}

/// How a fresh result was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub total_calls: usize,
    pub detail: TierDetail,
}

impl AnalysisMetadata {
    pub fn direct(total_calls: usize) -> Self {
        Self {
            total_calls,
            detail: TierDetail::Direct,
        }
    }

    pub fn sampled(info: SamplingInfo) -> Self {
        Self {
            total_calls: info.original_count,
            detail: TierDetail::Sampled(info),
        }
    }

    pub fn hierarchical(total_calls: usize, info: HierarchicalInfo) -> Self {
        Self {
            total_calls,
            detail: TierDetail::Hierarchical(info),
        }
    }

    pub fn tier(&self) -> AnalysisTier {
        match self.detail {
            TierDetail::Direct => AnalysisTier::Direct,
            TierDetail::Sampled(_) => AnalysisTier::Sampled,
            TierDetail::Hierarchical(_) => AnalysisTier::Hierarchical,
        }
    }

    pub fn sampling_info(&self) -> Option<&SamplingInfo> {
        match &self.detail {
            TierDetail::Sampled(info) => Some(info),
            _ => None,
        }
    }

    pub fn hierarchical_info(&self) -> Option<&HierarchicalInfo> {
        match &self.detail {
            TierDetail::Hierarchical(info) => Some(info),
            _ => None,
        }
    }
}

/// What an analysis request produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// Generated by this engine; carries the tier metadata of the run
    Fresh {
        analysis: TrendAnalysisResult,
        metadata: AnalysisMetadata,
    },
    /// Loaded from a previously persisted analysis; no run metadata exists
    FromHistory { analysis: TrendAnalysisResult },
    /// The range holds no calls
    Empty { message: String },
}

impl AnalysisOutcome {
    pub fn empty() -> Self {
        Self::Empty {
            message: NO_DATA_MESSAGE.to_string(),
        }
    }

    pub fn analysis(&self) -> Option<&TrendAnalysisResult> {
        match self {
            Self::Fresh { analysis, .. } | Self::FromHistory { analysis } => Some(analysis),
            Self::Empty { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&AnalysisMetadata> {
        match self {
            Self::Fresh { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Tier that produced the outcome; an empty range counts as direct
    pub fn tier(&self) -> Option<AnalysisTier> {
        match self {
            Self::Fresh { metadata, .. } => Some(metadata.tier()),
            Self::FromHistory { .. } => None,
            Self::Empty { .. } => Some(AnalysisTier::Direct),
        }
    }

    pub fn total_calls(&self) -> usize {
        match self {
            Self::Fresh { metadata, .. } => metadata.total_calls,
            Self::FromHistory { analysis } => analysis.period_analysis.total_calls,
            Self::Empty { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

/// A complete answer to one trend analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub subject: SubjectId,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub outcome: AnalysisOutcome,
}

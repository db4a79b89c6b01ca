//! Analysis tier selection
//!
//! Maps the number of call records in a request to the strategy used to fit
//! them into a bounded-context summarizer.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::domain::errors::AnalysisError;
use crate::domain::types::ThresholdCount;

/// Strategy used to analyze a record set
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisTier {
    /// Every record is summarized in a single call
    #[display("direct")]
    Direct,
    /// A representative subset is summarized in a single call
    #[display("sampled")]
    Sampled,
    /// Records are summarized per chunk, then the chunk summaries are merged
    #[display("hierarchical")]
    Hierarchical,
}

/// The two record-count thresholds that separate the tiers
///
/// `sample < hierarchical` is checked at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    sample: ThresholdCount,
    hierarchical: ThresholdCount,
}

impl TierThresholds {
    pub fn try_new(
        sample: ThresholdCount,
        hierarchical: ThresholdCount,
    ) -> Result<Self, AnalysisError> {
        if sample >= hierarchical {
            return Err(AnalysisError::Configuration(format!(
                "sample threshold ({sample}) must be below hierarchical threshold ({hierarchical})"
            )));
        }
        Ok(Self {
            sample,
            hierarchical,
        })
    }

    pub fn sample(&self) -> ThresholdCount {
        self.sample
    }

    pub fn hierarchical(&self) -> ThresholdCount {
        self.hierarchical
    }

    /// Pick the tier for `record_count` records
    ///
    /// Counts up to and including the sample threshold run directly; counts up
    /// to and including the hierarchical threshold are sampled; anything larger
    /// is chunked.
    pub fn select_tier(&self, record_count: usize) -> AnalysisTier {
        if record_count <= self.sample.into_inner() {
            AnalysisTier::Direct
        } else if record_count <= self.hierarchical.into_inner() {
            AnalysisTier::Sampled
        } else {
            AnalysisTier::Hierarchical
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            sample: ThresholdCount::new(50),
            hierarchical: ThresholdCount::new(120),
        }
    }
}

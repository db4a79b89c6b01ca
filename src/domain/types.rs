//! Validated value types for the coaching trend domain
//!
//! This module provides newtypes for the primitive values that flow through
//! the analysis pipeline, so that invalid identifiers, scores, and tuning
//! knobs are rejected at the boundary instead of deep inside a run.

use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the subject (usually a sales rep) whose calls are analyzed
///
/// Limited to 128 characters so it stays usable as part of a cache key and
/// in structured log fields.
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 128,
        regex = r"^[A-Za-z0-9][A-Za-z0-9_.:@-]*$"
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        PartialOrd,
        Ord,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct SubjectId(String);

/// Unique identifier of a single call record
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRef
))]
pub struct CallId(Uuid);

impl CallId {
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// Heat score assigned to a graded call (0 = cold, 100 = hot)
#[nutype(
    validate(finite, greater_or_equal = 0.0, less_or_equal = 100.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Display)
)]
pub struct HeatScore(f64);

/// Record-count threshold used by tier selection
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRef,
    Display
))]
pub struct ThresholdCount(usize);

/// Upper bound on the number of records summarized together in one chunk
#[nutype(
    validate(greater = 0),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct ChunkSize(usize);

/// Maximum number of concurrent stage-1 summarizer calls
#[nutype(
    validate(greater = 0, less_or_equal = 64),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct FanOut(usize);

impl Default for FanOut {
    fn default() -> Self {
        Self::try_new(4).expect("Default fan-out is valid")
    }
}

/// Number of records the sampler keeps when down-sampling
///
/// At least two, so that the first and last record of the span always fit.
#[nutype(
    validate(greater_or_equal = 2),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct SampleTarget(usize);

/// Share of the sample reserved for extreme heat scores (0.0 to 1.0)
#[nutype(
    validate(finite, greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)
)]
pub struct ExtremesFraction(f64);

impl Default for ExtremesFraction {
    fn default() -> Self {
        Self::try_new(0.3).expect("Default extremes fraction is valid")
    }
}

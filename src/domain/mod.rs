//! Domain types and pure business logic for coaching trend analysis
//!
//! Everything in this module is free of I/O: value types, tier selection,
//! chunk planning, the result model, and period validation.

pub mod analysis;
pub mod call_record;
pub mod chunk_plan;
pub mod date_range;
pub mod errors;
pub mod period_validation;
pub mod tier;
pub mod types;

pub use analysis::{
    AnalysisMetadata, AnalysisOutcome, HierarchicalInfo, PeriodAnalysis, SamplingInfo,
    SamplingStrategy, ScoreTrend, TierDetail, TrendAnalysisResult, TrendReport,
};
pub use call_record::CallRecord;
pub use chunk_plan::ChunkPlan;
pub use date_range::DateRange;
pub use errors::{AnalysisError, RecordStoreError, SummarizerError};
pub use period_validation::{
    validate_periods, PeriodValidation, QuickFix, Severity, ValidationWarning,
};
pub use tier::{AnalysisTier, TierThresholds};
pub use types::{
    CallId, ChunkSize, ExtremesFraction, FanOut, HeatScore, SampleTarget, SubjectId,
    ThresholdCount,
};

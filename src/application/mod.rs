//! Application services and analysis orchestration
//!
//! This module contains the services that coordinate domain logic with the
//! record store and summarizer collaborators.

pub mod app;
pub mod cache;
pub mod chunk_synthesizer;
pub mod comparison;
pub mod debounce;
pub mod invocation;
pub mod orchestrator;
pub mod ports;
pub mod sampler;

pub use app::{AnalysisOutput, AnalysisRequest, Application, ComparisonOutput};
pub use cache::{AnalysisCache, CacheConfig, CacheKey};
pub use chunk_synthesizer::ChunkSynthesizer;
pub use comparison::{
    ComparisonController, ComparisonPreset, ComparisonSession, ComparisonSetup, ComparisonState,
    Effect, PrimaryState, RecordPreview,
};
pub use debounce::RangeDebouncer;
pub use invocation::SummarizerInvoker;
pub use orchestrator::{AnalysisConfig, AnalysisOptions, TrendOrchestrator};
pub use ports::{
    AnalysisHistory, CallScope, ChunkSummary, NoHistory, RecordBatch, RecordStore, Summarizer,
    SummaryRequest,
};
pub use sampler::{Sampler, SamplingPolicy};

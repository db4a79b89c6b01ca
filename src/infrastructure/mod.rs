//! Infrastructure layer for the trend coach
//!
//! Concrete record stores and summarizers behind the application ports.

pub mod model_summarizer;
pub mod record_store;
pub mod summarizer;

pub use model_summarizer::{ModelSummarizer, TextModel};
pub use record_store::{InMemoryRecordStore, JsonFileRecordStore};
pub use summarizer::StatisticalSummarizer;

//! Trend Coach - coaching trend analysis over graded sales calls
//!
//! Picks a summarization tier from the number of calls in a range (direct,
//! sampled, or hierarchical map-reduce), caches reports per subject and
//! range, and validates period comparisons before they run.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::Application;
pub use error::{Error, Result};

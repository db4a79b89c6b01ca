//! Partitioning of a record set into bounded, contiguous chunks

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::domain::types::ChunkSize;

/// Ordered, disjoint, contiguous index ranges covering `0..total`
///
/// Every chunk holds at most `max_size` records; only the last one may be
/// smaller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    total: usize,
    chunks: Vec<Range<usize>>,
}

impl ChunkPlan {
    pub fn new(total: usize, max_size: ChunkSize) -> Self {
        let size = max_size.into_inner();
        let chunks = (0..total)
            .step_by(size)
            .map(|start| start..(start + size).min(total))
            .collect();
        Self { total, chunks }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Range<usize>] {
        &self.chunks
    }

    /// Number of records in each chunk, earliest chunk first
    pub fn sizes(&self) -> Vec<usize> {
        self.chunks.iter().map(ExactSizeIterator::len).collect()
    }
}

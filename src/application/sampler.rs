//! Representative down-sampling of a medium-sized record set
//!
//! Selection runs in four passes over records sorted oldest first:
//!
//! 1. the first and last record, so the sample spans the full range
//! 2. the `k` highest and `k` lowest heat scores, where
//!    `k = floor(target * extremes_fraction / 2)`, so strong and weak calls
//!    both reach the synthesis
//! 3. one record per equal-width time bucket, nearest the bucket midpoint
//! 4. evenly spaced leftovers if buckets ran dry (dense clusters)
//!
//! The output is in time order and depends only on the input order.

use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::domain::{
    CallRecord, ExtremesFraction, SampleTarget, SamplingInfo, SamplingStrategy,
};

/// Tunable parameters of the sampling policy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingPolicy {
    pub extremes_fraction: ExtremesFraction,
}

#[derive(Debug, Clone, Default)]
pub struct Sampler {
    policy: SamplingPolicy,
}

impl Sampler {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy }
    }

    /// Pick `target` records out of `records` (expected to be sorted by time)
    pub fn sample(
        &self,
        records: &[CallRecord],
        target: SampleTarget,
    ) -> (Vec<CallRecord>, SamplingInfo) {
        let original_count = records.len();
        let target = target.into_inner();

        if target >= original_count {
            // Tier selection should never hand a set this small to the sampler.
            error!(
                original_count,
                target, "sampler asked to keep at least every record; returning all"
            );
            return (
                records.to_vec(),
                SamplingInfo {
                    original_count,
                    sampled_count: original_count,
                    strategy: SamplingStrategy::TemporalStratifiedWithExtremes,
                },
            );
        }

        let mut selected = BTreeSet::new();
        selected.insert(0);
        selected.insert(original_count - 1);

        self.select_extremes(records, target, &mut selected);
        select_by_time_bucket(records, target, &mut selected);
        select_evenly_spaced(original_count, target, &mut selected);

        debug!(
            original_count,
            sampled_count = selected.len(),
            "sampled call records"
        );

        let subset: Vec<CallRecord> = selected.iter().map(|&i| records[i].clone()).collect();
        let info = SamplingInfo {
            original_count,
            sampled_count: subset.len(),
            strategy: SamplingStrategy::TemporalStratifiedWithExtremes,
        };
        (subset, info)
    }

    fn select_extremes(
        &self,
        records: &[CallRecord],
        target: usize,
        selected: &mut BTreeSet<usize>,
    ) {
        let per_side =
            (target as f64 * self.policy.extremes_fraction.into_inner() / 2.0).floor() as usize;
        if per_side == 0 {
            return;
        }

        let mut scored: Vec<(usize, f64)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| record.score().map(|score| (i, score)))
            .collect();
        // Highest first; equal scores keep the earlier record first.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let highest = scored.iter().take(per_side);
        let lowest = scored.iter().rev().take(per_side);
        for &(index, _) in highest.chain(lowest) {
            if selected.len() >= target {
                break;
            }
            selected.insert(index);
        }
    }
}

fn select_by_time_bucket(records: &[CallRecord], target: usize, selected: &mut BTreeSet<usize>) {
    let remaining = target.saturating_sub(selected.len());
    if remaining == 0 {
        return;
    }

    let first = records[0].occurred_at;
    let span_ms = (records[records.len() - 1].occurred_at - first).num_milliseconds() as f64;
    let bucket_ms = span_ms / remaining as f64;

    for bucket in 0..remaining {
        if selected.len() >= target {
            break;
        }
        let start = bucket as f64 * bucket_ms;
        let end = start + bucket_ms;
        let midpoint = start + bucket_ms / 2.0;
        let last_bucket = bucket + 1 == remaining;

        let candidate = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !selected.contains(i))
            .map(|(i, record)| (i, (record.occurred_at - first).num_milliseconds() as f64))
            .filter(|&(_, offset)| offset >= start && (offset < end || last_bucket))
            .min_by(|a, b| {
                (a.1 - midpoint)
                    .abs()
                    .total_cmp(&(b.1 - midpoint).abs())
                    .then(a.0.cmp(&b.0))
            });

        if let Some((index, _)) = candidate {
            selected.insert(index);
        }
    }
}

fn select_evenly_spaced(total: usize, target: usize, selected: &mut BTreeSet<usize>) {
    let remaining = target.saturating_sub(selected.len());
    if remaining == 0 {
        return;
    }

    // total > target, so there are at least `remaining` unselected indices and
    // the stride is at least one.
    let unselected: Vec<usize> = (0..total).filter(|i| !selected.contains(i)).collect();
    let stride = unselected.len() as f64 / remaining as f64;
    for slot in 0..remaining {
        let position = ((slot as f64 + 0.5) * stride).floor() as usize;
        if let Some(&index) = unselected.get(position.min(unselected.len() - 1)) {
            selected.insert(index);
        }
    }
}

//! Property-based tests for the analysis invariants
//!
//! Tier selection, chunk planning, sampling, and period validation are pure,
//! so their invariants are checked across generated inputs.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use trend_coach::application::{Sampler, SamplingPolicy};
use trend_coach::domain::{
    validate_periods, AnalysisTier, CallRecord, ChunkPlan, ChunkSize, DateRange,
    ExtremesFraction, HeatScore, QuickFix, SampleTarget, Severity, ThresholdCount,
    TierThresholds,
};

pub mod generators {
    use super::*;
    use proptest::collection::vec;

    /// Thresholds with `sample < hierarchical`
    pub fn thresholds() -> impl Strategy<Value = TierThresholds> {
        (1usize..500, 1usize..500).prop_map(|(sample, gap)| {
            TierThresholds::try_new(ThresholdCount::new(sample), ThresholdCount::new(sample + gap))
                .unwrap()
        })
    }

    /// Records sorted by time, some without a heat score
    pub fn records(min: usize, max: usize) -> impl Strategy<Value = Vec<CallRecord>> {
        vec((0i64..90 * 24 * 60, prop::option::of(0.0f64..=100.0)), min..max).prop_map(
            |mut raw| {
                raw.sort_by_key(|(minute, _)| *minute);
                let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
                raw.into_iter()
                    .map(|(minute, score)| {
                        let record = CallRecord::new(start + Duration::minutes(minute));
                        match score {
                            Some(score) => record.with_heat_score(HeatScore::try_new(score).unwrap()),
                            None => record,
                        }
                    })
                    .collect()
            },
        )
    }

    /// Whole-day range starting somewhere in 2023 or 2024
    pub fn date_range() -> impl Strategy<Value = DateRange> {
        (0u64..700, 0u64..120).prop_map(|(offset, length)| {
            let first = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Days::new(offset);
            DateRange::whole_days(first, first + chrono::Days::new(length)).unwrap()
        })
    }
}

fn strictness(tier: AnalysisTier) -> u8 {
    match tier {
        AnalysisTier::Direct => 0,
        AnalysisTier::Sampled => 1,
        AnalysisTier::Hierarchical => 2,
    }
}

proptest! {
    #[test]
    fn tier_selection_is_monotonic(thresholds in generators::thresholds(), count in 0usize..2_000) {
        let here = thresholds.select_tier(count);
        let next = thresholds.select_tier(count + 1);
        prop_assert!(strictness(here) <= strictness(next));
        prop_assert_eq!(here, thresholds.select_tier(count));
    }

    #[test]
    fn tier_boundaries_are_inclusive(thresholds in generators::thresholds()) {
        let sample = thresholds.sample().into_inner();
        let hierarchical = thresholds.hierarchical().into_inner();
        prop_assert_eq!(thresholds.select_tier(sample), AnalysisTier::Direct);
        prop_assert_eq!(thresholds.select_tier(sample + 1), AnalysisTier::Sampled);
        prop_assert_eq!(thresholds.select_tier(hierarchical), AnalysisTier::Sampled);
        prop_assert_eq!(thresholds.select_tier(hierarchical + 1), AnalysisTier::Hierarchical);
    }

    #[test]
    fn chunk_plans_cover_records_contiguously(total in 0usize..5_000, size in 1usize..200) {
        let plan = ChunkPlan::new(total, ChunkSize::try_new(size).unwrap());

        prop_assert_eq!(plan.sizes().iter().sum::<usize>(), total);
        let mut expected_start = 0;
        for chunk in plan.chunks() {
            prop_assert_eq!(chunk.start, expected_start);
            prop_assert!(!chunk.is_empty() && chunk.len() <= size);
            expected_start = chunk.end;
        }
        prop_assert_eq!(expected_start, total);
    }

    #[test]
    fn samples_keep_the_full_span(
        records in generators::records(3, 300),
        target in 2usize..120,
        fraction in 0.0f64..=1.0,
    ) {
        let sampler = Sampler::new(SamplingPolicy {
            extremes_fraction: ExtremesFraction::try_new(fraction).unwrap(),
        });
        let (subset, info) = sampler.sample(&records, SampleTarget::try_new(target).unwrap());

        prop_assert!(info.sampled_count <= info.original_count);
        prop_assert_eq!(info.original_count, records.len());
        prop_assert_eq!(subset.len(), info.sampled_count);
        prop_assert_eq!(subset.len(), target.min(records.len()));
        prop_assert_eq!(subset.first().map(|r| r.id), records.first().map(|r| r.id));
        prop_assert_eq!(subset.last().map(|r| r.id), records.last().map(|r| r.id));
        prop_assert!(subset.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
    }

    #[test]
    fn sampling_is_deterministic(records in generators::records(60, 200)) {
        let sampler = Sampler::default();
        let target = SampleTarget::try_new(50).unwrap();
        let first: Vec<_> = sampler.sample(&records, target).0.iter().map(|r| r.id).collect();
        let second: Vec<_> = sampler.sample(&records, target).0.iter().map(|r| r.id).collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn a_period_compared_with_itself_is_an_error(range in generators::date_range()) {
        let validation = validate_periods(&range, &range);

        prop_assert!(validation.is_identical);
        prop_assert!(validation.blocks_execution());
        let has_identical_period_error = validation.warnings.iter().any(|w| {
            w.severity == Severity::Error && w.quick_fix == Some(QuickFix::UsePreviousPeriod)
        });
        prop_assert!(has_identical_period_error);
    }

    #[test]
    fn the_previous_period_never_warns(range in generators::date_range()) {
        let previous = range.preceding();
        let validation = validate_periods(&previous, &range);

        prop_assert_eq!(previous.days(), range.days());
        prop_assert!(validation.warnings.is_empty());
    }

    #[test]
    fn quick_fixes_resolve_their_warning(a in generators::date_range(), b in generators::date_range()) {
        prop_assume!(a != b);
        let validation = validate_periods(&a, &b);

        for fix in validation.quick_fixes() {
            let fixed = validate_periods(&fix.apply(&a, &b), &b);
            match fix {
                QuickFix::ShiftPeriodA => prop_assert!(!fixed.has_overlap),
                QuickFix::MatchDuration => prop_assert_eq!(fixed.days_difference, 0),
                QuickFix::UsePreviousPeriod => prop_assert!(fixed.warnings.is_empty()),
            }
        }
    }
}

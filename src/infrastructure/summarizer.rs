//! Offline summarizer that derives trend analyses from call statistics
//!
//! Useful wherever no model endpoint is configured. It reads heat scores and
//! the per-call strength and weakness tags; free-text summaries are ignored.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::ports::{ChunkSummary, Summarizer, SummaryRequest};
use crate::domain::analysis::DEFAULT_STABILITY_POINTS;
use crate::domain::call_record::average_score;
use crate::domain::{CallRecord, PeriodAnalysis, ScoreTrend, SummarizerError, TrendAnalysisResult};

const TOP_THEMES: usize = 5;
const FOCUS_AREAS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct StatisticalSummarizer {
    stability_points: f64,
}

impl StatisticalSummarizer {
    pub fn new(stability_points: f64) -> Self {
        Self { stability_points }
    }

    fn summarize_calls(&self, calls: &[CallRecord]) -> TrendAnalysisResult {
        let (earlier, later) = calls.split_at(calls.len() / 2);
        let trend = ScoreTrend::from_scores(
            average_score(earlier),
            average_score(later),
            self.stability_points,
        );

        let mut strengths = ThemeTally::default();
        let mut weaknesses = ThemeTally::default();
        for call in calls {
            strengths.add_all(&call.strengths, 1);
            weaknesses.add_all(&call.weaknesses, 1);
        }

        build(
            calls.len(),
            average_score(calls),
            trend,
            Themes::per("calls", strengths, weaknesses),
        )
    }

    fn merge_chunks(&self, total_calls: usize, chunks: &[ChunkSummary]) -> TrendAnalysisResult {
        let (earlier, later) = chunks.split_at(chunks.len() / 2);
        let trend = ScoreTrend::from_scores(
            weighted_average(earlier),
            weighted_average(later),
            self.stability_points,
        );

        let mut strengths = ThemeTally::default();
        let mut weaknesses = ThemeTally::default();
        // A chunk reports themes without per-call counts, so each counts once.
        for chunk in chunks {
            strengths.add_all(&chunk.result.strengths, 1);
            weaknesses.add_all(&chunk.result.improvements, 1);
        }

        build(
            total_calls,
            weighted_average(chunks),
            trend,
            Themes::per("chunks", strengths, weaknesses),
        )
    }
}

impl Default for StatisticalSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_POINTS)
    }
}

#[async_trait]
impl Summarizer for StatisticalSummarizer {
    async fn summarize(
        &self,
        request: &SummaryRequest<'_>,
    ) -> Result<TrendAnalysisResult, SummarizerError> {
        Ok(match request {
            SummaryRequest::Calls { calls, .. } => self.summarize_calls(calls),
            SummaryRequest::Synthesis {
                total_calls,
                chunks,
                ..
            } => self.merge_chunks(*total_calls, chunks),
        })
    }
}

/// Average of chunk averages, weighted by how many calls each chunk covered
fn weighted_average(chunks: &[ChunkSummary]) -> Option<f64> {
    let (sum, weight) = chunks
        .iter()
        .filter_map(|c| {
            c.result
                .period_analysis
                .average_score
                .map(|avg| (avg * c.call_count as f64, c.call_count))
        })
        .fold((0.0, 0usize), |(sum, weight), (s, w)| (sum + s, weight + w));
    (weight > 0).then(|| sum / weight as f64)
}

/// Case-insensitive frequency count that remembers first spelling and order
#[derive(Default)]
struct ThemeTally {
    counts: HashMap<String, (usize, usize, String)>,
}

impl ThemeTally {
    fn add_all(&mut self, themes: &[String], weight: usize) {
        for theme in themes {
            let label = theme.trim();
            if label.is_empty() {
                continue;
            }
            let next = self.counts.len();
            let entry = self
                .counts
                .entry(label.to_lowercase())
                .or_insert_with(|| (0, next, label.to_string()));
            entry.0 += weight;
        }
    }

    /// Themes by descending weight, first-seen first among equals
    fn ranked(&self) -> Vec<(String, usize)> {
        let mut ranked: Vec<_> = self.counts.values().collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked
            .into_iter()
            .map(|(count, _, label)| (label.clone(), *count))
            .collect()
    }
}

/// Tallied themes and the unit their counts are measured in
struct Themes {
    unit: &'static str,
    strengths: ThemeTally,
    weaknesses: ThemeTally,
}

impl Themes {
    fn per(unit: &'static str, strengths: ThemeTally, weaknesses: ThemeTally) -> Self {
        Self {
            unit,
            strengths,
            weaknesses,
        }
    }
}

fn build(
    total_calls: usize,
    average: Option<f64>,
    trend: ScoreTrend,
    themes: Themes,
) -> TrendAnalysisResult {
    let unit = themes.unit;
    let strengths = themes.strengths.ranked();
    let weaknesses = themes.weaknesses.ranked();

    let summary = match average {
        Some(avg) => format!(
            "{total_calls} calls analyzed with an average heat score of {avg:.1}; trend is {trend}."
        ),
        None => format!("{total_calls} calls analyzed; no heat scores were recorded."),
    };

    let recurring_patterns = strengths
        .iter()
        .chain(&weaknesses)
        .filter(|(_, count)| *count > 1)
        .map(|(label, count)| format!("{label} (noted in {count} {unit})"))
        .collect();

    TrendAnalysisResult {
        summary,
        period_analysis: PeriodAnalysis {
            total_calls,
            average_score: average,
            score_trend: trend,
        },
        strengths: labels(&strengths, TOP_THEMES),
        improvements: labels(&weaknesses, TOP_THEMES),
        coaching_focus: weaknesses
            .iter()
            .take(FOCUS_AREAS)
            .map(|(label, _)| format!("Work on {label}"))
            .collect(),
        recurring_patterns,
    }
}

fn labels(ranked: &[(String, usize)], limit: usize) -> Vec<String> {
    ranked
        .iter()
        .take(limit)
        .map(|(label, _)| label.clone())
        .collect()
}

//! Graded sales call records as supplied by the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{CallId, HeatScore};

/// A single historical call, already transcribed and graded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub heat_score: Option<HeatScore>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

impl CallRecord {
    pub fn new(occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: CallId::generate(),
            occurred_at,
            heat_score: None,
            summary: None,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
        }
    }

    pub fn with_heat_score(mut self, score: HeatScore) -> Self {
        self.heat_score = Some(score);
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strengths.push(strength.into());
        self
    }

    pub fn with_weakness(mut self, weakness: impl Into<String>) -> Self {
        self.weaknesses.push(weakness.into());
        self
    }

    pub fn score(&self) -> Option<f64> {
        self.heat_score.map(HeatScore::into_inner)
    }
}

/// Sort records oldest first, keeping the store's order for equal timestamps
pub fn sort_chronologically(records: &mut [CallRecord]) {
    records.sort_by_key(|record| record.occurred_at);
}

/// Mean heat score over the records that carry one
pub fn average_score(records: &[CallRecord]) -> Option<f64> {
    let scores: Vec<f64> = records.iter().filter_map(CallRecord::score).collect();
    if scores.is_empty() {
        return None;
    }
    Some(scores.iter().sum::<f64>() / scores.len() as f64)
}

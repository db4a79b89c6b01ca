//! Date range type used for analysis periods

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::AnalysisError;

/// Closed interval `[from, to]` of instants
///
/// Constructed only through [`DateRange::try_new`] (or the whole-day helper),
/// so `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawDateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = AnalysisError;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        Self::try_new(raw.from, raw.to)
    }
}

impl DateRange {
    pub fn try_new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, AnalysisError> {
        if from > to {
            return Err(AnalysisError::Validation(format!(
                "date range starts after it ends ({from} > {to})"
            )));
        }
        Ok(Self { from, to })
    }

    /// Range covering whole calendar days, `first 00:00:00` to `last 23:59:59` UTC
    pub fn whole_days(first: NaiveDate, last: NaiveDate) -> Result<Self, AnalysisError> {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        Self::try_new(
            first.and_time(NaiveTime::MIN).and_utc(),
            last.and_time(end_of_day).and_utc(),
        )
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn span(&self) -> Duration {
        self.to - self.from
    }

    /// Length in days, counting both ends (Jan 1 to Jan 31 is 31 days)
    pub fn days(&self) -> i64 {
        self.span().num_days() + 1
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.from <= instant && instant <= self.to
    }

    /// Overlapping part of two ranges, if any
    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.from.max(other.from);
        let end = self.to.min(other.to);
        (start <= end).then_some(DateRange {
            from: start,
            to: end,
        })
    }

    /// A range of `span` that ends on the calendar day before `anchor` starts
    ///
    /// The end keeps the time of day of `end_time_of`, so whole-day ranges stay
    /// whole-day ranges after the move.
    pub fn ending_day_before(anchor: &DateRange, end_time_of: DateTime<Utc>, span: Duration) -> Self {
        let end_date = anchor.from.date_naive() - Duration::days(1);
        let to = end_date.and_time(end_time_of.time()).and_utc();
        Self {
            from: to - span,
            to,
        }
    }

    /// The period immediately preceding this one with the same length
    pub fn preceding(&self) -> Self {
        Self::ending_day_before(self, self.to, self.span())
    }

    /// This range's end with its start moved so the span equals `span`
    pub fn with_span_ending_at_to(&self, span: Duration) -> Self {
        Self {
            from: self.to - span,
            to: self.to,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let result = DateRange::try_new(day(2024, 2, 1), day(2024, 1, 1));
        assert!(matches!(result, Err(AnalysisError::Validation(_))));
    }

    #[test]
    fn test_single_instant_is_one_day() {
        let range = DateRange::try_new(day(2024, 1, 1), day(2024, 1, 1)).unwrap();
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn test_days_counts_both_ends() {
        let range = DateRange::try_new(day(2024, 1, 1), day(2024, 1, 31)).unwrap();
        assert_eq!(range.days(), 31);

        let whole = DateRange::whole_days(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        assert_eq!(whole.days(), 31);
    }

    #[test]
    fn test_intersection() {
        let a = DateRange::try_new(day(2024, 1, 1), day(2024, 1, 31)).unwrap();
        let b = DateRange::try_new(day(2024, 1, 15), day(2024, 2, 15)).unwrap();
        let overlap = a.intersection(&b).unwrap();
        assert_eq!(overlap.from(), day(2024, 1, 15));
        assert_eq!(overlap.to(), day(2024, 1, 31));

        let c = DateRange::try_new(day(2024, 3, 1), day(2024, 3, 5)).unwrap();
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_preceding_period_has_same_length_and_no_overlap() {
        let range = DateRange::try_new(day(2024, 2, 1), day(2024, 2, 29)).unwrap();
        let previous = range.preceding();
        assert_eq!(previous.to(), day(2024, 1, 31));
        assert_eq!(previous.days(), range.days());
        assert!(previous.intersection(&range).is_none());
    }

    #[test]
    fn test_preceding_whole_day_range_stays_whole_day() {
        let range = DateRange::whole_days(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
        )
        .unwrap();
        let previous = range.preceding();
        assert_eq!(previous.from(), day(2023, 12, 14));
        assert_eq!(previous.to().date_naive(), NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!(previous.days(), range.days());
    }

    #[test]
    fn test_deserialize_validates_order() {
        let ok: Result<DateRange, _> =
            serde_json::from_str(r#"{"from":"2024-01-01T00:00:00Z","to":"2024-01-02T00:00:00Z"}"#);
        assert!(ok.is_ok());

        let inverted: Result<DateRange, _> =
            serde_json::from_str(r#"{"from":"2024-01-02T00:00:00Z","to":"2024-01-01T00:00:00Z"}"#);
        assert!(inverted.is_err());
    }
}

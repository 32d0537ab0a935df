//! Rate-over-time views of decoded records.
//!
//! Reporting and plotting tools consume a rate log as a series of
//! `(timestamp, count)` points plus a handful of aggregate figures. Both are
//! computed here from any iterator of [`RateEntry`], typically a
//! [`RateLogReader`](crate::reader::RateLogReader).

use serde::{Deserialize, Serialize};

use crate::format::RateEntry;

/// One point of a rate-over-time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePoint {
    /// Slot, in epoch seconds.
    pub timestamp: i64,
    /// Events observed in the slot.
    pub count: i64,
}

/// Extracts the rate-over-time series, optionally keeping only one metadata tag.
///
/// # Examples
///
/// ```rust
/// use ratelog::analysis::rate_over_time;
/// use ratelog::format::RateEntry;
///
/// let entries = vec![RateEntry::new(1, 10, 100), RateEntry::new(2, 99, 101)];
/// let points = rate_over_time(entries, Some(1));
/// assert_eq!(points.len(), 1);
/// assert_eq!(points[0].count, 10);
/// ```
pub fn rate_over_time<I>(entries: I, metadata: Option<i32>) -> Vec<RatePoint>
where
    I: IntoIterator<Item = RateEntry>,
{
    entries
        .into_iter()
        .filter(|e| metadata.is_none_or(|m| e.metadata == m))
        .map(|e| RatePoint {
            timestamp: e.timestamp,
            count: e.count,
        })
        .collect()
}

/// Aggregate figures over a run of rate records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    /// Number of records.
    pub records: usize,
    /// Sum of all counts (saturating).
    pub total: i64,
    /// Smallest per-slot count.
    pub min: Option<i64>,
    /// Largest per-slot count.
    pub max: Option<i64>,
    /// Mean count per recorded slot.
    pub mean: Option<f64>,
    /// Timestamp of the first record.
    pub first_timestamp: Option<i64>,
    /// Timestamp of the last record.
    pub last_timestamp: Option<i64>,
    /// Number of places where one or more slots were skipped.
    pub gaps: usize,
    /// Total number of skipped slots.
    pub missing_slots: i64,
}

impl RateSummary {
    /// Computes the summary in a single pass.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RateEntry>,
    {
        let mut summary = Self {
            records: 0,
            total: 0,
            min: None,
            max: None,
            mean: None,
            first_timestamp: None,
            last_timestamp: None,
            gaps: 0,
            missing_slots: 0,
        };

        for entry in entries {
            if let Some(prev) = summary.last_timestamp
                && entry.timestamp > prev.saturating_add(1)
            {
                summary.gaps += 1;
                let missing = i128::from(entry.timestamp) - i128::from(prev) - 1;
                summary.missing_slots = summary.missing_slots.saturating_add(clamp_i64(missing));
            }

            summary.records += 1;
            summary.total = summary.total.saturating_add(entry.count);
            summary.min = Some(summary.min.map_or(entry.count, |m| m.min(entry.count)));
            summary.max = Some(summary.max.map_or(entry.count, |m| m.max(entry.count)));
            if summary.first_timestamp.is_none() {
                summary.first_timestamp = Some(entry.timestamp);
            }
            summary.last_timestamp = Some(entry.timestamp);
        }

        if summary.records > 0 {
            #[allow(clippy::cast_precision_loss)] // Reporting value, exactness not required
            let mean = summary.total as f64 / summary.records as f64;
            summary.mean = Some(mean);
        }

        summary
    }

    /// Number of slots spanned from the first to the last record, inclusive.
    ///
    /// Saturates at `i64::MAX` for spans wider than the `i64` range.
    pub fn span_slots(&self) -> Option<i64> {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => {
                Some(clamp_i64(i128::from(last) - i128::from(first) + 1))
            }
            _ => None,
        }
    }
}

fn clamp_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<RateEntry> {
        vec![
            RateEntry::new(1, 100, 1000),
            RateEntry::new(1, 150, 1001),
            RateEntry::new(2, 90, 1002),
            RateEntry::new(1, 60, 1006),
        ]
    }

    #[test]
    fn test_rate_over_time_all() {
        let points = rate_over_time(entries(), None);
        assert_eq!(points.len(), 4);
        assert_eq!(
            points[3],
            RatePoint {
                timestamp: 1006,
                count: 60
            }
        );
    }

    #[test]
    fn test_rate_over_time_filtered() {
        let points = rate_over_time(entries(), Some(2));
        assert_eq!(
            points,
            vec![RatePoint {
                timestamp: 1002,
                count: 90
            }]
        );
    }

    #[test]
    fn test_summary() {
        let summary = RateSummary::from_entries(entries());

        assert_eq!(summary.records, 4);
        assert_eq!(summary.total, 400);
        assert_eq!(summary.min, Some(60));
        assert_eq!(summary.max, Some(150));
        assert_eq!(summary.mean, Some(100.0));
        assert_eq!(summary.first_timestamp, Some(1000));
        assert_eq!(summary.last_timestamp, Some(1006));
        assert_eq!(summary.gaps, 1);
        assert_eq!(summary.missing_slots, 3);
        assert_eq!(summary.span_slots(), Some(7));
    }

    #[test]
    fn test_summary_empty() {
        let summary = RateSummary::from_entries(Vec::new());
        assert_eq!(summary.records, 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.span_slots(), None);
    }

    #[test]
    fn test_summary_with_extreme_timestamps() {
        let summary = RateSummary::from_entries(vec![
            RateEntry::new(0, 1, i64::MIN),
            RateEntry::new(0, 1, i64::MAX),
        ]);

        assert_eq!(summary.gaps, 1);
        assert_eq!(summary.missing_slots, i64::MAX);
        assert_eq!(summary.span_slots(), Some(i64::MAX));
    }

    #[test]
    fn test_missing_slots_accumulation_saturates() {
        let summary = RateSummary::from_entries(vec![
            RateEntry::new(0, 1, i64::MIN),
            RateEntry::new(0, 1, 0),
            RateEntry::new(0, 1, i64::MAX),
        ]);

        assert_eq!(summary.gaps, 2);
        assert_eq!(summary.missing_slots, i64::MAX);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = RateSummary::from_entries(entries());
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["records"], 4);
        assert_eq!(json["missing_slots"], 3);
        assert_eq!(json["max"], 150);
    }
}

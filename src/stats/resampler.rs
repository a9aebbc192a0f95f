//! Resampler Module
//! Buckets timestamped rows into calendar windows and reduces each bucket.
//!
//! The output covers every bucket between the earliest and the latest
//! timestamp, so a series never has gaps even when a bucket has no rows.

use crate::data::{FrameError, RowSet};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Calendar width of a bucket. Bucket boundaries are half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketWidth {
    Day,
    /// Monday to Sunday.
    Week,
    /// Fourteen days, starting on the Monday of the earliest timestamp's week.
    TwoWeek,
    /// First of the month; 28 to 31 days long.
    Month,
}

impl BucketWidth {
    /// Start of the bucket containing `date`. `origin` anchors two-week buckets.
    pub fn floor(self, date: NaiveDate, origin: NaiveDate) -> NaiveDate {
        match self {
            BucketWidth::Day => date,
            BucketWidth::Week => monday_of(date),
            BucketWidth::TwoWeek => {
                let periods = (date - origin).num_days().div_euclid(14);
                origin + TimeDelta::days(periods * 14)
            }
            BucketWidth::Month => date.with_day(1).unwrap_or(date),
        }
    }

    /// Start of the bucket after the one starting at `start`.
    pub fn next(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            BucketWidth::Day => start.checked_add_signed(TimeDelta::days(1)),
            BucketWidth::Week => start.checked_add_signed(TimeDelta::days(7)),
            BucketWidth::TwoWeek => start.checked_add_signed(TimeDelta::days(14)),
            BucketWidth::Month => start.checked_add_months(Months::new(1)),
        }
    }
}

/// What to compute per bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResampleOp {
    /// Rows per bucket.
    Count,
    /// Mean of a value column.
    Mean(String),
    /// Sum of a value column.
    Sum(String),
}

/// One bucket of a resampled series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    pub start: NaiveDateTime,
    pub value: Option<f64>,
}

/// Ordered buckets, ascending by start.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub width: BucketWidth,
    pub buckets: Vec<TimeBucket>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.buckets.iter().map(|b| b.value).collect()
    }

    /// Buckets ranked by value, largest first; missing values last.
    pub fn sorted_by_value_desc(&self) -> Vec<TimeBucket> {
        let mut ranked = self.buckets.clone();
        ranked.sort_by(|a, b| match (a.value, b.value) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        ranked
    }

    /// Trailing moving average over consecutive buckets.
    pub fn rolling_mean(&self, window: usize, min_periods: usize) -> Result<TimeSeries, FrameError> {
        let smoothed = rolling_mean(&self.values(), window, min_periods)?;
        Ok(TimeSeries {
            width: self.width,
            buckets: self
                .buckets
                .iter()
                .zip(smoothed)
                .map(|(b, value)| TimeBucket {
                    start: b.start,
                    value,
                })
                .collect(),
        })
    }
}

/// Time-bucketed reductions.
pub struct Resampler;

impl Resampler {
    /// Bucket `rows` on the timestamp column `anchor` and reduce per bucket.
    pub fn resample(
        rows: &RowSet,
        anchor: &str,
        width: BucketWidth,
        op: &ResampleOp,
    ) -> Result<TimeSeries, FrameError> {
        let stamps = rows.timestamps(anchor)?;
        let values = match op {
            ResampleOp::Count => None,
            ResampleOp::Mean(column) | ResampleOp::Sum(column) => Some(rows.numbers(column)?),
        };
        Ok(Self::bucket(&stamps, values.as_deref(), width, op))
    }

    /// Pure bucketing core over aligned timestamp/value slices.
    pub fn bucket(
        stamps: &[Option<NaiveDateTime>],
        values: Option<&[Option<f64>]>,
        width: BucketWidth,
        op: &ResampleOp,
    ) -> TimeSeries {
        let empty = TimeSeries {
            width,
            buckets: Vec::new(),
        };
        let Some(first) = stamps.iter().flatten().min() else {
            return empty;
        };
        let origin = monday_of(first.date());

        // bucket start -> (rows, sum of present values, present values)
        let mut acc: BTreeMap<NaiveDate, (usize, f64, usize)> = BTreeMap::new();
        for (row, stamp) in stamps.iter().enumerate() {
            let Some(stamp) = stamp else {
                continue;
            };
            let entry = acc.entry(width.floor(stamp.date(), origin)).or_default();
            entry.0 += 1;
            if let Some(v) = values.and_then(|vs| vs.get(row).copied().flatten()) {
                entry.1 += v;
                entry.2 += 1;
            }
        }

        let (Some(&low), Some(&high)) = (acc.keys().next(), acc.keys().next_back()) else {
            return empty;
        };

        let mut buckets = Vec::new();
        let mut cursor = Some(low);
        while let Some(start) = cursor.filter(|s| *s <= high) {
            let (rows, sum, present) = acc.get(&start).copied().unwrap_or_default();
            let value = match op {
                ResampleOp::Count => Some(rows as f64),
                ResampleOp::Sum(_) => Some(sum),
                ResampleOp::Mean(_) => (present > 0).then(|| sum / present as f64),
            };
            buckets.push(TimeBucket {
                start: start.and_time(chrono::NaiveTime::MIN),
                value,
            });
            cursor = width.next(start);
        }

        TimeSeries { width, buckets }
    }
}

/// Trailing mean over the last `window` entries, emitted once at least
/// `min_periods` of them are present.
pub fn rolling_mean(
    values: &[Option<f64>],
    window: usize,
    min_periods: usize,
) -> Result<Vec<Option<f64>>, FrameError> {
    if window == 0 || min_periods == 0 || min_periods > window {
        return Err(FrameError::InvalidWindow {
            window,
            min_periods,
        });
    }

    Ok((0..values.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[lo..=i].iter().flatten().copied().collect();
            (present.len() >= min_periods)
                .then(|| present.iter().sum::<f64>() / present.len() as f64)
        })
        .collect())
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(i64::from(date.weekday().num_days_from_monday()))
}

//! Stats module - Descriptive statistics, grouping and resampling

mod aggregator;
mod calculator;
mod resampler;

pub use aggregator::{Aggregator, GroupCounts, GroupSummary, PivotTable, ValueCount};
pub use calculator::{Describe, Stat, StatsCalculator};
pub use resampler::{rolling_mean, BucketWidth, ResampleOp, Resampler, TimeBucket, TimeSeries};

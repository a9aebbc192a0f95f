//! Statistics Calculator Module
//! Handles descriptive statistics over plain value slices.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// A reduction applied to the values of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Count,
    Mean,
    Median,
    Sum,
    Min,
    Max,
}

/// Summary of a numeric column (the shape of a `describe()` report).
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Default for Describe {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

/// Handles statistical calculations.
pub struct StatsCalculator;

impl StatsCalculator {
    /// Apply `stat` to `values`. Count and sum of nothing are zero; every
    /// other statistic of nothing is missing.
    pub fn compute(stat: Stat, values: &[f64]) -> Option<f64> {
        match stat {
            Stat::Count => Some(values.len() as f64),
            Stat::Sum => Some(values.iter().sum()),
            _ if values.is_empty() => None,
            Stat::Mean => Some(values.iter().mean()),
            Stat::Median => Some(Data::new(values.to_vec()).median()),
            Stat::Min => values.iter().copied().reduce(f64::min),
            Stat::Max => values.iter().copied().reduce(f64::max),
        }
    }

    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> Describe {
        let n = values.len();
        if n == 0 {
            return Describe::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Sample standard deviation; a single value has none
        let std = if n > 1 {
            values.iter().std_dev()
        } else {
            f64::NAN
        };

        Describe {
            count: n,
            mean: values.iter().mean(),
            std,
            min: sorted[0],
            p25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            p75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_small_group() {
        let values = [10.0, 40.0, 20.0, 30.0];
        assert_eq!(StatsCalculator::compute(Stat::Count, &values), Some(4.0));
        assert_eq!(StatsCalculator::compute(Stat::Sum, &values), Some(100.0));
        assert_eq!(StatsCalculator::compute(Stat::Mean, &values), Some(25.0));
        assert_eq!(StatsCalculator::compute(Stat::Median, &values), Some(25.0));
        assert_eq!(StatsCalculator::compute(Stat::Min, &values), Some(10.0));
        assert_eq!(StatsCalculator::compute(Stat::Max, &values), Some(40.0));
    }

    #[test]
    fn empty_input() {
        assert_eq!(StatsCalculator::compute(Stat::Count, &[]), Some(0.0));
        assert_eq!(StatsCalculator::compute(Stat::Median, &[]), None);
        assert_eq!(StatsCalculator::compute(Stat::Mean, &[]), None);
        assert_eq!(StatsCalculator::compute_descriptive_stats(&[]).count, 0);
    }

    #[test]
    fn describe_matches_numpy_quartiles() {
        let d = StatsCalculator::compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(d.count, 5);
        assert_eq!(d.mean, 3.0);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.p25, 2.0);
        assert_eq!(d.median, 3.0);
        assert_eq!(d.p75, 4.0);
        assert_eq!(d.max, 5.0);
        assert!((d.std - 2.5_f64.sqrt()).abs() < 1e-12);

        let single = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert!(single.std.is_nan());
        assert_eq!(single.median, 7.0);
    }
}

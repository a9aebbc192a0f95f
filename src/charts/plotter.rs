//! Chart Plotter Module
//! Shapes query results into labeled series and hands them to a plotting sink.

use crate::data::TIMESTAMP_TEXT_FORMAT;
use crate::stats::{TimeSeries, ValueCount};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write chart: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to draw chart: {0}")]
    Draw(String),
    #[error("Series {0:?} has no points to draw")]
    EmptySeries(String),
}

/// Position of a point along the x axis (or the y axis for horizontal bars).
#[derive(Debug, Clone, PartialEq)]
pub enum AxisKey {
    Category(String),
    Time(NaiveDateTime),
    Number(f64),
}

impl AxisKey {
    pub fn label(&self) -> String {
        match self {
            AxisKey::Category(c) => c.clone(),
            AxisKey::Time(t) => t.format(TIMESTAMP_TEXT_FORMAT).to_string(),
            AxisKey::Number(n) => n.to_string(),
        }
    }
}

/// A labeled, ordered sequence of points.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub label: String,
    pub points: Vec<(AxisKey, f64)>,
}

impl ChartSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Line,
    Bar,
    BarHorizontal,
    /// Points are raw observations; the sink bins them.
    Histogram,
}

/// Display settings consumed only by a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    pub title: Option<String>,
    pub kind: ChartKind,
    pub y_bounds: Option<(f64, f64)>,
    pub x_bounds: Option<(f64, f64)>,
    /// Histogram bin count.
    pub bins: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            title: None,
            kind: ChartKind::Line,
            y_bounds: None,
            x_bounds: None,
            bins: 10,
            width: 1000,
            height: 600,
        }
    }
}

impl DisplayOptions {
    pub fn kind(mut self, kind: ChartKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn y_bounds(mut self, low: f64, high: f64) -> Self {
        self.y_bounds = Some((low, high));
        self
    }

    pub fn x_bounds(mut self, low: f64, high: f64) -> Self {
        self.x_bounds = Some((low, high));
        self
    }

    pub fn bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }
}

/// Anything that can render a series: an image writer, a recorder, a GUI.
pub trait PlotSink {
    fn render(&mut self, series: &ChartSeries, options: &DisplayOptions) -> Result<(), RenderError>;
}

/// A sink that only logs what it was given.
#[derive(Debug, Default)]
pub struct DiscardSink;

impl PlotSink for DiscardSink {
    fn render(&mut self, series: &ChartSeries, options: &DisplayOptions) -> Result<(), RenderError> {
        tracing::debug!(
            label = %series.label,
            points = series.points.len(),
            kind = ?options.kind,
            "chart discarded"
        );
        Ok(())
    }
}

/// Builds chart series from query results.
pub struct ChartPlotter;

impl ChartPlotter {
    pub fn from_value_counts(label: &str, counts: &[ValueCount]) -> ChartSeries {
        ChartSeries {
            label: label.to_string(),
            points: counts
                .iter()
                .map(|c| (AxisKey::Category(c.value.clone()), c.count as f64))
                .collect(),
        }
    }

    /// Buckets with a missing value are left out.
    pub fn from_time_series(label: &str, series: &TimeSeries) -> ChartSeries {
        ChartSeries {
            label: label.to_string(),
            points: series
                .buckets
                .iter()
                .filter_map(|b| b.value.map(|v| (AxisKey::Time(b.start), v)))
                .collect(),
        }
    }

    /// Pair two aligned numeric columns, skipping rows where either is missing.
    pub fn from_pairs(label: &str, xs: &[Option<f64>], ys: &[Option<f64>]) -> ChartSeries {
        ChartSeries {
            label: label.to_string(),
            points: xs
                .iter()
                .zip(ys)
                .filter_map(|(x, y)| Some((AxisKey::Number((*x)?), (*y)?)))
                .collect(),
        }
    }

    /// Raw observations for a histogram.
    pub fn from_observations(label: &str, values: &[Option<f64>]) -> ChartSeries {
        ChartSeries {
            label: label.to_string(),
            points: values
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (AxisKey::Number(i as f64), v)))
                .collect(),
        }
    }

    /// Equal-width bins over `values`: `(low, high, count)` per bin. The last
    /// bin is closed on the right so the maximum is counted.
    pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
        if values.is_empty() || bins == 0 {
            return Vec::new();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let step = (max - min) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in values {
            let index = (((v - min) / step) as usize).min(bins - 1);
            counts[index] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| (min + i as f64 * step, min + (i + 1) as f64 * step, count))
            .collect()
    }
}

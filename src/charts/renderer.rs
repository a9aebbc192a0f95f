//! Static Chart Renderer
//! Writes chart series to PNG files with plotters.
//!
//! Layout:
//! 1. Title centered above the plot area
//! 2. Line, bar, horizontal bar or histogram body
//! 3. Category or time labels on the key axis

use crate::charts::plotter::{
    AxisKey, ChartKind, ChartPlotter, ChartSeries, DisplayOptions, PlotSink, RenderError,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::PathBuf;

const LINE_COLOR: RGBColor = RGBColor(91, 155, 213);
const FILL_COLOR: RGBColor = RGBColor(189, 215, 238);
const EDGE_COLOR: RGBColor = RGBColor(52, 104, 160);

/// Plotting sink that writes `<out_dir>/<slug>.png` per chart.
pub struct StaticChartRenderer {
    out_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl PlotSink for StaticChartRenderer {
    fn render(&mut self, series: &ChartSeries, options: &DisplayOptions) -> Result<(), RenderError> {
        if series.is_empty() {
            return Err(RenderError::EmptySeries(series.label.clone()));
        }
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.output_path(series, options);

        {
            let root =
                BitMapBackend::new(&path, (options.width, options.height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;
            match options.kind {
                ChartKind::Line => Self::draw_line(&root, series, options)?,
                ChartKind::Bar => Self::draw_bars(&root, series, options)?,
                ChartKind::BarHorizontal => Self::draw_horizontal_bars(&root, series, options)?,
                ChartKind::Histogram => Self::draw_histogram(&root, series, options)?,
            }
            root.present().map_err(draw_err)?;
        }

        tracing::info!(path = %path.display(), kind = ?options.kind, "chart written");
        self.written.push(path);
        Ok(())
    }
}

impl StaticChartRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            written: Vec::new(),
        }
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn output_path(&self, series: &ChartSeries, options: &DisplayOptions) -> PathBuf {
        self.out_dir
            .join(format!("{}.png", slug(&Self::title(series, options))))
    }

    fn title(series: &ChartSeries, options: &DisplayOptions) -> String {
        options
            .title
            .clone()
            .unwrap_or_else(|| series.label.clone())
    }

    fn draw_line<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        series: &ChartSeries,
        options: &DisplayOptions,
    ) -> Result<(), RenderError> {
        let (xs, labels) = key_positions(series);
        let ys: Vec<f64> = series.points.iter().map(|(_, y)| *y).collect();
        let (x_low, x_high) = options.x_bounds.unwrap_or_else(|| padded_span(&xs));
        let (y_low, y_high) = options.y_bounds.unwrap_or_else(|| span_from_zero(&ys));

        let mut chart = ChartBuilder::on(root)
            .caption(Self::title(series, options), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_low..x_high, y_low..y_high)
            .map_err(draw_err)?;

        let format_x = |x: &f64| tick_label(labels.as_deref(), *x);
        chart
            .configure_mesh()
            .x_label_formatter(&format_x)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                xs.into_iter().zip(ys),
                LINE_COLOR.stroke_width(2),
            ))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        series: &ChartSeries,
        options: &DisplayOptions,
    ) -> Result<(), RenderError> {
        let labels: Vec<String> = series.points.iter().map(|(k, _)| short_label(k)).collect();
        let ys: Vec<f64> = series.points.iter().map(|(_, y)| *y).collect();
        let n = ys.len() as f64;
        let (y_low, y_high) = options.y_bounds.unwrap_or_else(|| span_from_zero(&ys));

        let mut chart = ChartBuilder::on(root)
            .caption(Self::title(series, options), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..n - 0.5, y_low..y_high)
            .map_err(draw_err)?;

        let format_x = |x: &f64| tick_label(Some(&labels), *x);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&format_x)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(ys.iter().enumerate().map(|(i, y)| {
                let x = i as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, *y)], FILL_COLOR.filled())
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_horizontal_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        series: &ChartSeries,
        options: &DisplayOptions,
    ) -> Result<(), RenderError> {
        let labels: Vec<String> = series.points.iter().map(|(k, _)| short_label(k)).collect();
        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        let n = values.len() as f64;
        let (v_low, v_high) = options.x_bounds.unwrap_or_else(|| span_from_zero(&values));

        let mut chart = ChartBuilder::on(root)
            .caption(Self::title(series, options), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(120)
            .build_cartesian_2d(v_low..v_high, -0.5..n - 0.5)
            .map_err(draw_err)?;

        let format_y = |y: &f64| tick_label(Some(&labels), *y);
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(labels.len())
            .y_label_formatter(&format_y)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(values.iter().enumerate().map(|(i, v)| {
                let y = i as f64;
                Rectangle::new([(0.0, y - 0.4), (*v, y + 0.4)], FILL_COLOR.filled())
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_histogram<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        series: &ChartSeries,
        options: &DisplayOptions,
    ) -> Result<(), RenderError> {
        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        let bins = ChartPlotter::histogram_bins(&values, options.bins.max(1));
        let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
            return Err(RenderError::EmptySeries(series.label.clone()));
        };
        let (x_low, x_high) = options.x_bounds.unwrap_or((first.0, last.1));
        let tallest = bins.iter().map(|b| b.2).max().unwrap_or(0) as f64;
        let (y_low, y_high) = options
            .y_bounds
            .unwrap_or((0.0, (tallest * 1.1).max(1.0)));

        let mut chart = ChartBuilder::on(root)
            .caption(Self::title(series, options), ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_low..x_high, y_low..y_high)
            .map_err(draw_err)?;

        chart.configure_mesh().draw().map_err(draw_err)?;

        chart
            .draw_series(bins.iter().map(|&(low, high, count)| {
                Rectangle::new([(low, 0.0), (high, count as f64)], FILL_COLOR.filled())
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(bins.iter().map(|&(low, high, count)| {
                Rectangle::new([(low, 0.0), (high, count as f64)], EDGE_COLOR.stroke_width(1))
            }))
            .map_err(draw_err)?;
        Ok(())
    }
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Numeric keys plot at their value; anything else plots at its index with
/// a text label.
fn key_positions(series: &ChartSeries) -> (Vec<f64>, Option<Vec<String>>) {
    let numeric: Option<Vec<f64>> = series
        .points
        .iter()
        .map(|(k, _)| match k {
            AxisKey::Number(n) => Some(*n),
            _ => None,
        })
        .collect();
    match numeric {
        Some(xs) => (xs, None),
        None => (
            (0..series.points.len()).map(|i| i as f64).collect(),
            Some(series.points.iter().map(|(k, _)| short_label(k)).collect()),
        ),
    }
}

fn short_label(key: &AxisKey) -> String {
    match key {
        AxisKey::Time(t) => t.format("%Y-%m-%d").to_string(),
        other => other.label(),
    }
}

fn tick_label(labels: Option<&[String]>, position: f64) -> String {
    let Some(labels) = labels else {
        return format!("{position}");
    };
    let index = position.round();
    if (position - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    labels.get(index as usize).cloned().unwrap_or_default()
}

fn padded_span(values: &[f64]) -> (f64, f64) {
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !low.is_finite() || !high.is_finite() {
        return (0.0, 1.0);
    }
    if low == high {
        return (low - 1.0, high + 1.0);
    }
    let pad = (high - low) * 0.02;
    (low - pad, high + pad)
}

fn span_from_zero(values: &[f64]) -> (f64, f64) {
    let low = values.iter().copied().fold(0.0, f64::min);
    let high = values.iter().copied().fold(0.0, f64::max);
    if high <= low {
        return (low, low + 1.0);
    }
    (low, high * 1.1)
}

fn slug(title: &str) -> String {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "chart".to_string()
    } else {
        trimmed.to_string()
    }
}

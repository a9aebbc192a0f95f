//! Recipes module - Canned analyses over prepared datasets
//!
//! A recipe runs a fixed list of questions against a row-set, collecting a
//! [`Finding`] per question and pushing charts to a [`PlotSink`]. Chart
//! failures are logged and never abort the recipe.

mod bloom_dates;
mod service_requests;

pub use bloom_dates::bloom_dates;
pub use service_requests::service_requests;

use crate::charts::{ChartSeries, DisplayOptions, PlotSink};
use crate::stats::{GroupCounts, ValueCount};
use std::fmt;

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub title: String,
    pub body: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {}", self.title)?;
        write!(f, "{}", self.body)
    }
}

/// Collects findings and forwards charts while a recipe runs.
pub struct Report<'a> {
    sink: &'a mut dyn PlotSink,
    size: (u32, u32),
    findings: Vec<Finding>,
}

impl<'a> Report<'a> {
    pub fn new(sink: &'a mut dyn PlotSink, size: (u32, u32)) -> Self {
        Self {
            sink,
            size,
            findings: Vec::new(),
        }
    }

    pub fn note(&mut self, title: &str, body: impl Into<String>) {
        self.findings.push(Finding {
            title: title.to_string(),
            body: body.into(),
        });
    }

    pub fn chart(&mut self, series: ChartSeries, mut options: DisplayOptions) {
        (options.width, options.height) = self.size;
        if let Err(e) = self.sink.render(&series, &options) {
            tracing::warn!(label = %series.label, error = %e, "chart skipped");
        }
    }

    pub fn finish(self) -> Vec<Finding> {
        self.findings
    }
}

pub(crate) fn top(mut counts: Vec<ValueCount>, n: usize) -> Vec<ValueCount> {
    counts.truncate(n);
    counts
}

pub(crate) fn format_counts(counts: &[ValueCount]) -> String {
    if counts.is_empty() {
        return "(no rows)".to_string();
    }
    let width = counts.iter().map(|c| c.value.len()).max().unwrap_or(0);
    counts
        .iter()
        .map(|c| format!("{:<width$}  {}", c.value, c.count))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn format_group_counts(groups: &[GroupCounts]) -> String {
    if groups.is_empty() {
        return "(no rows)".to_string();
    }
    groups
        .iter()
        .map(|g| {
            let inner: Vec<String> = g
                .counts
                .iter()
                .map(|c| format!("  {}  {}", c.value, c.count))
                .collect();
            format!("{} ({} rows)\n{}", g.group, g.total, inner.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a millisecond span as `D days HH:MM:SS`.
pub(crate) fn format_millis(millis: f64) -> String {
    if !millis.is_finite() {
        return "-".to_string();
    }
    let sign = if millis < 0.0 { "-" } else { "" };
    let total = (millis.abs() / 1000.0).round() as u64;
    let (days, rest) = (total / 86_400, total % 86_400);
    format!(
        "{sign}{days} days {:02}:{:02}:{:02}",
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    )
}

pub(crate) fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{AxisKey, RenderError};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, u32)>,
    }

    impl PlotSink for Recorder {
        fn render(&mut self, series: &ChartSeries, options: &DisplayOptions) -> Result<(), RenderError> {
            if series.is_empty() {
                return Err(RenderError::EmptySeries(series.label.clone()));
            }
            self.seen.push((series.label.clone(), options.width));
            Ok(())
        }
    }

    #[test]
    fn report_applies_size_and_survives_chart_errors() {
        let mut recorder = Recorder::default();
        let mut report = Report::new(&mut recorder, (640, 480));
        report.chart(
            ChartSeries {
                label: "empty".into(),
                points: Vec::new(),
            },
            DisplayOptions::default(),
        );
        report.chart(
            ChartSeries {
                label: "one".into(),
                points: vec![(AxisKey::Number(1.0), 1.0)],
            },
            DisplayOptions::default(),
        );
        report.note("Question", "Answer");
        let findings = report.finish();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].to_string(), "## Question\nAnswer");
        assert_eq!(recorder.seen, vec![("one".to_string(), 640)]);
    }

    #[test]
    fn millis_render_like_timedeltas() {
        assert_eq!(format_millis(86_400_000.0 + 3_723_000.0), "1 days 01:02:03");
        assert_eq!(format_millis(-60_000.0), "-0 days 00:01:00");
        assert_eq!(format_millis(f64::NAN), "-");
    }

    #[test]
    fn numbers() {
        assert_eq!(format_number(Some(105.0)), "105");
        assert_eq!(format_number(Some(104.54)), "104.54");
        assert_eq!(format_number(None), "-");
    }

    #[test]
    fn counts_align() {
        let text = format_counts(&[
            ValueCount {
                value: "NYPD".into(),
                count: 10,
            },
            ValueCount {
                value: "DOT".into(),
                count: 2,
            },
        ]);
        assert_eq!(text, "NYPD  10\nDOT   2");
        assert_eq!(format_counts(&[]), "(no rows)");
    }
}

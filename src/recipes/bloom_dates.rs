//! Kyoto cherry blossom questions.

use super::{format_counts, format_number, top, Finding, Report};
use crate::charts::{ChartKind, ChartPlotter, DisplayOptions};
use crate::data::{DataProcessor, FrameError, RowSet};
use crate::stats::{Aggregator, Stat, StatsCalculator};

const YEAR: &str = "AD";
const DOY: &str = "Full-flowering_date_(DOY)";
const MONTH_DAY: &str = "Full-flowering_date";
const REFERENCE: &str = "Reference_Name";
const DATA_TYPE: &str = "Data_type_code";
const ROLLING: &str = "Rolling_date";

/// Data type code for dates taken from titles of Japanese poetry.
const POETRY_CODE: f64 = 4.0;

pub fn bloom_dates(rows: &RowSet, mut report: Report<'_>) -> Result<Vec<Finding>, FrameError> {
    tracing::info!(rows = rows.height(), "running bloom date recipe");

    report.note("First years on record", years(&rows.head(5))?);
    report.note("Last years on record", years(&rows.tail(5))?);

    report.note(
        "Most common references",
        format_counts(&top(Aggregator::value_counts(rows, REFERENCE)?, 5)),
    );

    let dated = rows.filter_not_missing(DOY)?;
    report.note(
        "Years with a full-flowering date",
        format!("{} of {}", dated.height(), rows.height()),
    );

    let observations = ChartPlotter::from_observations("full-flowering date", &rows.numbers(MONTH_DAY)?);
    for bins in [10, 39] {
        report.chart(
            observations.clone(),
            DisplayOptions::default()
                .kind(ChartKind::Histogram)
                .bins(bins)
                .title(&format!("Full-flowering date ({bins} bins)")),
        );
    }

    let summary = Aggregator::describe(rows, DOY)?;
    report.note(
        "Day of year of full flowering",
        format!(
            "count: {}\nmean: {:.2}\nstd: {:.2}\nmin: {}\n25%: {}\n50%: {}\n75%: {}\nmax: {}",
            summary.count,
            summary.mean,
            summary.std,
            summary.min,
            summary.p25,
            summary.median,
            summary.p75,
            summary.max
        ),
    );

    let before = rows.filter_numeric(YEAR, |ad| ad < 1900.0)?;
    let after = rows.filter_numeric(YEAR, |ad| ad > 1900.0)?;
    report.note(
        "Median day of year before and after 1900",
        format!(
            "before 1900: {}\nafter 1900: {}",
            format_number(median(&before, DOY)?),
            format_number(median(&after, DOY)?)
        ),
    );

    report.note(
        "Data type codes",
        format_counts(&Aggregator::value_counts(rows, DATA_TYPE)?),
    );
    let poetry = rows.filter_numeric(DATA_TYPE, |code| code == POETRY_CODE)?;
    report.note(
        "Years dated from Japanese poetry",
        format!("{} years: {}", poetry.height(), years(&poetry)?),
    );

    report.chart(
        ChartPlotter::from_pairs("day of year", &rows.numbers(YEAR)?, &rows.numbers(DOY)?),
        DisplayOptions::default().title("Full-flowering day of year"),
    );

    let short = DataProcessor::rolling_mean(rows, DOY, 10, 5, "rolling_10")?;
    let smoothed = DataProcessor::rolling_mean(&short, DOY, 20, 5, ROLLING)?;
    let tail = smoothed.tail(5);
    let lines: Vec<String> = tail
        .numbers(YEAR)?
        .into_iter()
        .zip(tail.numbers("rolling_10")?)
        .zip(tail.numbers(ROLLING)?)
        .map(|((ad, ten), twenty)| {
            format!(
                "{}  10-row {}  20-row {}",
                format_number(ad),
                format_number(ten),
                format_number(twenty)
            )
        })
        .collect();
    report.note("Rolling mean of the flowering day", lines.join("\n"));
    report.chart(
        ChartPlotter::from_pairs(
            "rolling day of year",
            &smoothed.numbers(YEAR)?,
            &smoothed.numbers(ROLLING)?,
        ),
        DisplayOptions::default()
            .title("Full-flowering day of year, 20-row rolling mean")
            .y_bounds(80.0, 120.0),
    );

    let labelled = DataProcessor::calendar_labels(rows, MONTH_DAY, Some("Month_date"), Some("Day_of_month"))?;
    let labelled = DataProcessor::concat(&labelled, &["Month_date", "Day_of_month"], " ", "Date")?;
    let per_month = Aggregator::value_counts(&labelled, "Month_date")?;
    report.note("Blossoms per month", format_counts(&per_month));
    report.note(
        "Latest full-flowering dates",
        labelled
            .tail(5)
            .texts("Date")?
            .into_iter()
            .map(|d| d.unwrap_or_else(|| "-".to_string()))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    report.chart(
        ChartPlotter::from_value_counts("blossoms per month", &per_month),
        DisplayOptions::default().title("Blossoms per month"),
    );

    Ok(report.finish())
}

fn years(rows: &RowSet) -> Result<String, FrameError> {
    Ok(rows
        .numbers(YEAR)?
        .into_iter()
        .map(format_number)
        .collect::<Vec<_>>()
        .join(", "))
}

fn median(rows: &RowSet, column: &str) -> Result<Option<f64>, FrameError> {
    let values: Vec<f64> = rows.numbers(column)?.into_iter().flatten().collect();
    Ok(StatsCalculator::compute(Stat::Median, &values))
}

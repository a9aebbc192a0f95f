//! Data Processor Module
//! Derives new columns from existing ones (durations, calendar labels,
//! calendar fields, concatenations, rolling means).
//!
//! Every derivation is a pure function of its inputs and appends a new column;
//! nothing already in the row-set is modified.

use crate::data::rowset::{
    duration_column, float_column, integer_column, text_column, FrameError, RowSet,
};
use crate::stats::rolling_mean;
use chrono::{Datelike, Month, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Year used to validate month/day encodings, which carry no year of their own.
const MONTH_DAY_REFERENCE_YEAR: i32 = 1900;

/// Calendar projection of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarField {
    Year,
    Month,
    MonthName,
    Day,
    Hour,
}

impl CalendarField {
    /// Numeric value of the field; month names report the month number.
    pub fn number(self, stamp: &NaiveDateTime) -> i64 {
        match self {
            CalendarField::Year => i64::from(stamp.year()),
            CalendarField::Month | CalendarField::MonthName => i64::from(stamp.month()),
            CalendarField::Day => i64::from(stamp.day()),
            CalendarField::Hour => i64::from(stamp.hour()),
        }
    }
}

/// Handles column derivations.
pub struct DataProcessor;

impl DataProcessor {
    /// `name = end - start`, missing where either side is missing.
    pub fn duration(
        rows: &RowSet,
        end: &str,
        start: &str,
        name: &str,
    ) -> Result<RowSet, FrameError> {
        let ends = rows.timestamps(end)?;
        let starts = rows.timestamps(start)?;
        let elapsed: Vec<_> = ends
            .iter()
            .zip(&starts)
            .map(|(e, s)| match (e, s) {
                (Some(e), Some(s)) => Some(*e - *s),
                _ => None,
            })
            .collect();
        rows.with_column(duration_column(name, &elapsed)?)
    }

    /// Decode a month/day number such as `402` (April 2nd).
    ///
    /// The value is read as a zero-padded `MMDD` pattern; anything that is not
    /// a whole number or not a real calendar day yields `None`.
    pub fn decode_month_day(value: f64) -> Option<(u32, u32)> {
        if !value.is_finite() || value.fract() != 0.0 || !(0.0..10_000.0).contains(&value) {
            return None;
        }
        let encoded = value as u32;
        let (month, day) = (encoded / 100, encoded % 100);
        NaiveDate::from_ymd_opt(MONTH_DAY_REFERENCE_YEAR, month, day)?;
        Some((month, day))
    }

    /// English month name for a month number.
    pub fn month_name(month: u32) -> Option<&'static str> {
        u8::try_from(month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
    }

    /// Month name and/or zero-padded day-of-month columns from a month/day number.
    pub fn calendar_labels(
        rows: &RowSet,
        source: &str,
        month_name: Option<&str>,
        day_of_month: Option<&str>,
    ) -> Result<RowSet, FrameError> {
        let decoded: Vec<Option<(u32, u32)>> = rows
            .numbers(source)?
            .into_iter()
            .map(|v| v.and_then(Self::decode_month_day))
            .collect();

        let mut out = rows.clone();
        if let Some(name) = month_name {
            let months = decoded
                .iter()
                .map(|md| md.and_then(|(m, _)| Self::month_name(m)).map(str::to_string))
                .collect();
            out = out.with_column(text_column(name, months))?;
        }
        if let Some(name) = day_of_month {
            let days = decoded
                .iter()
                .map(|md| md.map(|(_, d)| format!("{d:02}")))
                .collect();
            out = out.with_column(text_column(name, days))?;
        }
        Ok(out)
    }

    /// Project a calendar field out of a timestamp column.
    pub fn calendar_field(
        rows: &RowSet,
        source: &str,
        field: CalendarField,
        name: &str,
    ) -> Result<RowSet, FrameError> {
        let stamps = rows.timestamps(source)?;
        let column = match field {
            CalendarField::MonthName => text_column(
                name,
                stamps
                    .iter()
                    .map(|t| t.and_then(|t| Self::month_name(t.month())).map(str::to_string))
                    .collect(),
            ),
            _ => integer_column(
                name,
                stamps
                    .iter()
                    .map(|t| t.map(|t| field.number(&t)))
                    .collect(),
            ),
        };
        rows.with_column(column)
    }

    /// Join the text of several columns with `separator`; missing if any part is.
    pub fn concat(
        rows: &RowSet,
        sources: &[&str],
        separator: &str,
        name: &str,
    ) -> Result<RowSet, FrameError> {
        let parts = sources
            .iter()
            .map(|source| rows.texts(source))
            .collect::<Result<Vec<_>, _>>()?;
        let joined = (0..rows.height())
            .map(|row| {
                parts
                    .iter()
                    .map(|column| column[row].as_deref())
                    .collect::<Option<Vec<_>>>()
                    .map(|pieces| pieces.join(separator))
            })
            .collect();
        rows.with_column(text_column(name, joined))
    }

    /// Trailing mean over the last `window` rows, emitted once at least
    /// `min_periods` of them are present.
    pub fn rolling_mean(
        rows: &RowSet,
        source: &str,
        window: usize,
        min_periods: usize,
        name: &str,
    ) -> Result<RowSet, FrameError> {
        let smoothed = rolling_mean(&rows.numbers(source)?, window, min_periods)?;
        rows.with_column(float_column(name, smoothed))
    }
}

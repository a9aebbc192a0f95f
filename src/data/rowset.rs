//! Row-set Module
//! In-memory table of records backed by a Polars DataFrame.
//!
//! Every transformation returns a new [`RowSet`]; existing columns are never
//! rewritten in place except through explicit type coercion.

use crate::data::processor::CalendarField;
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use polars::prelude::*;
use thiserror::Error;

/// Display layout used whenever a timestamp has to be rendered as text.
pub const TIMESTAMP_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Column already exists: {0}")]
    DuplicateColumn(String),
    #[error("Column {column} holds {actual:?} values, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: ValueKind,
    },
    #[error("Invalid timestamp format: {0:?}")]
    InvalidFormat(String),
    #[error("Invalid rolling window {window} with minimum {min_periods}")]
    InvalidWindow { window: usize, min_periods: usize },
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Integer,
    Float,
    Timestamp,
    Duration,
    Other,
}

impl ValueKind {
    fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::String => ValueKind::Text,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ValueKind::Integer,
            DataType::Float32 | DataType::Float64 => ValueKind::Float,
            DataType::Datetime(_, _) => ValueKind::Timestamp,
            DataType::Duration(_) => ValueKind::Duration,
            _ => ValueKind::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Integer | ValueKind::Float | ValueKind::Duration
        )
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Duration(TimeDelta),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// Ordered collection of records sharing one column set.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    df: DataFrame,
}

impl RowSet {
    pub fn from_dataframe(df: DataFrame) -> Self {
        Self { df }
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn kind(&self, name: &str) -> Result<ValueKind, FrameError> {
        Ok(ValueKind::of(self.column(name)?.dtype()))
    }

    pub(crate) fn column(&self, name: &str) -> Result<&Column, FrameError> {
        self.df
            .column(name)
            .map_err(|_| FrameError::ColumnNotFound(name.to_string()))
    }

    /// Text view of any column. Timestamps use [`TIMESTAMP_TEXT_FORMAT`].
    pub fn texts(&self, name: &str) -> Result<Vec<Option<String>>, FrameError> {
        let column = self.column(name)?;
        match ValueKind::of(column.dtype()) {
            ValueKind::Text => Ok(column
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect()),
            ValueKind::Timestamp => Ok(self
                .timestamps(name)?
                .into_iter()
                .map(|v| v.map(|t| t.format(TIMESTAMP_TEXT_FORMAT).to_string()))
                .collect()),
            ValueKind::Float => Ok(self
                .numbers(name)?
                .into_iter()
                .map(|v| v.map(|f| f.to_string()))
                .collect()),
            _ => {
                let cast = column.cast(&DataType::String)?;
                Ok(cast
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string))
                    .collect())
            }
        }
    }

    /// Numeric view of an integer, float or duration column.
    ///
    /// Durations are expressed in milliseconds. NaN is reported as missing.
    pub fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>, FrameError> {
        let column = self.column(name)?;
        match column.dtype() {
            DataType::Duration(unit) => {
                let unit = *unit;
                let physical = column.cast(&DataType::Int64)?;
                Ok(physical
                    .i64()?
                    .into_iter()
                    .map(|v| v.map(|raw| to_millis(raw, unit) as f64))
                    .collect())
            }
            dtype if ValueKind::of(dtype).is_numeric() => {
                let cast = column.cast(&DataType::Float64)?;
                Ok(cast
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|f| !f.is_nan()))
                    .collect())
            }
            dtype => Err(FrameError::TypeMismatch {
                column: name.to_string(),
                expected: "numeric",
                actual: ValueKind::of(dtype),
            }),
        }
    }

    pub fn timestamps(&self, name: &str) -> Result<Vec<Option<NaiveDateTime>>, FrameError> {
        let column = self.column(name)?;
        let DataType::Datetime(unit, _) = column.dtype() else {
            return Err(FrameError::TypeMismatch {
                column: name.to_string(),
                expected: "timestamp",
                actual: ValueKind::of(column.dtype()),
            });
        };
        let unit = *unit;
        let physical = column.cast(&DataType::Int64)?;
        Ok(physical
            .i64()?
            .into_iter()
            .map(|v| {
                v.and_then(|raw| DateTime::from_timestamp_millis(to_millis(raw, unit)))
                    .map(|dt| dt.naive_utc())
            })
            .collect())
    }

    pub fn durations(&self, name: &str) -> Result<Vec<Option<TimeDelta>>, FrameError> {
        let column = self.column(name)?;
        let DataType::Duration(unit) = column.dtype() else {
            return Err(FrameError::TypeMismatch {
                column: name.to_string(),
                expected: "duration",
                actual: ValueKind::of(column.dtype()),
            });
        };
        let unit = *unit;
        let physical = column.cast(&DataType::Int64)?;
        Ok(physical
            .i64()?
            .into_iter()
            .map(|v| v.and_then(|raw| TimeDelta::try_milliseconds(to_millis(raw, unit))))
            .collect())
    }

    /// Tagged cell at `row` of `name`. Out-of-range rows are missing.
    pub fn value(&self, name: &str, row: usize) -> Result<Value, FrameError> {
        let column = self.column(name)?;
        if row >= column.len() {
            return Ok(Value::Missing);
        }
        let cell = column.get(row)?;
        if cell.is_null() {
            return Ok(Value::Missing);
        }
        let value = match column.dtype() {
            DataType::Datetime(unit, _) => cell
                .extract::<i64>()
                .and_then(|raw| DateTime::from_timestamp_millis(to_millis(raw, *unit)))
                .map(|dt| Value::Timestamp(dt.naive_utc())),
            DataType::Duration(unit) => cell
                .extract::<i64>()
                .and_then(|raw| TimeDelta::try_milliseconds(to_millis(raw, *unit)))
                .map(Value::Duration),
            dtype => match ValueKind::of(dtype) {
                ValueKind::Integer => cell.extract::<i64>().map(Value::Int),
                ValueKind::Float => cell
                    .extract::<f64>()
                    .filter(|f| !f.is_nan())
                    .map(Value::Float),
                ValueKind::Text => cell.get_str().map(|s| Value::Text(s.to_string())),
                _ => Some(Value::Text(cell.to_string())),
            },
        };
        Ok(value.unwrap_or(Value::Missing))
    }

    /// Append a new column. Existing names are rejected.
    pub(crate) fn with_column(&self, column: Column) -> Result<Self, FrameError> {
        if self.has_column(column.name()) {
            return Err(FrameError::DuplicateColumn(column.name().to_string()));
        }
        let mut df = self.df.clone();
        df.with_column(column)?;
        Ok(Self { df })
    }

    /// Replace an existing column with a re-typed version under the same name.
    pub(crate) fn replace_column(&self, column: Column) -> Result<Self, FrameError> {
        self.column(column.name())?;
        let mut df = self.df.clone();
        df.with_column(column)?;
        Ok(Self { df })
    }

    pub fn head(&self, n: usize) -> Self {
        Self::from_dataframe(self.df.head(Some(n)))
    }

    pub fn tail(&self, n: usize) -> Self {
        Self::from_dataframe(self.df.tail(Some(n)))
    }

    /// Rows whose text value in `column` equals `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Self, FrameError> {
        let kind = self.kind(column)?;
        if kind != ValueKind::Text {
            return Err(FrameError::TypeMismatch {
                column: column.to_string(),
                expected: "text",
                actual: kind,
            });
        }
        let filtered = self
            .df
            .clone()
            .lazy()
            .filter(col(column).eq(lit(value)))
            .collect()?;
        Ok(Self::from_dataframe(filtered))
    }

    /// Rows whose text contains `needle`, optionally ignoring case.
    pub fn filter_contains(
        &self,
        column: &str,
        needle: &str,
        ignore_case: bool,
    ) -> Result<Self, FrameError> {
        let needle_lower = needle.to_lowercase();
        let mask = self
            .texts(column)?
            .iter()
            .map(|v| match v {
                Some(text) if ignore_case => text.to_lowercase().contains(&needle_lower),
                Some(text) => text.contains(needle),
                None => false,
            })
            .collect();
        self.filter_mask(mask)
    }

    /// Rows whose text is one of `values`.
    pub fn filter_in(&self, column: &str, values: &[&str]) -> Result<Self, FrameError> {
        let mask = self
            .texts(column)?
            .iter()
            .map(|v| v.as_deref().is_some_and(|text| values.contains(&text)))
            .collect();
        self.filter_mask(mask)
    }

    pub fn filter_not_missing(&self, column: &str) -> Result<Self, FrameError> {
        let mask = self.column(column)?.as_materialized_series().is_not_null();
        Ok(Self::from_dataframe(self.df.filter(&mask)?))
    }

    /// Rows whose numeric value satisfies `predicate`. Missing never matches.
    pub fn filter_numeric<F>(&self, column: &str, predicate: F) -> Result<Self, FrameError>
    where
        F: Fn(f64) -> bool,
    {
        let mask = self
            .numbers(column)?
            .into_iter()
            .map(|v| v.is_some_and(&predicate))
            .collect();
        self.filter_mask(mask)
    }

    /// Rows whose timestamp satisfies `predicate`. Missing never matches.
    pub fn filter_timestamp<F>(&self, column: &str, predicate: F) -> Result<Self, FrameError>
    where
        F: Fn(&NaiveDateTime) -> bool,
    {
        let mask = self
            .timestamps(column)?
            .iter()
            .map(|v| v.as_ref().is_some_and(&predicate))
            .collect();
        self.filter_mask(mask)
    }

    /// Rows with `start <= t < end`.
    pub fn filter_time_range(
        &self,
        column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self, FrameError> {
        self.filter_timestamp(column, |t| *t >= start && *t < end)
    }

    /// Rows whose timestamp matches every `(field, value)` pair, e.g.
    /// `[(Month, 12), (Day, 25)]` for Christmas of any year.
    pub fn filter_calendar(
        &self,
        column: &str,
        fields: &[(CalendarField, i64)],
    ) -> Result<Self, FrameError> {
        self.filter_timestamp(column, |t| {
            fields.iter().all(|(field, value)| field.number(t) == *value)
        })
    }

    fn filter_mask(&self, mask: Vec<bool>) -> Result<Self, FrameError> {
        let mask: BooleanChunked = mask.into_iter().collect();
        Ok(Self::from_dataframe(self.df.filter(&mask)?))
    }
}

fn to_millis(raw: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => raw.div_euclid(1_000_000),
        TimeUnit::Microseconds => raw.div_euclid(1_000),
        TimeUnit::Milliseconds => raw,
    }
}

pub(crate) fn text_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::new(name.into(), values)
}

pub(crate) fn integer_column(name: &str, values: Vec<Option<i64>>) -> Column {
    Column::new(name.into(), values)
}

pub(crate) fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name.into(), values)
}

pub(crate) fn timestamp_column(
    name: &str,
    values: &[Option<NaiveDateTime>],
) -> Result<Column, FrameError> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|t| t.and_utc().timestamp_millis()))
        .collect();
    Ok(Column::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

pub(crate) fn duration_column(
    name: &str,
    values: &[Option<TimeDelta>],
) -> Result<Column, FrameError> {
    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|d| d.num_milliseconds()))
        .collect();
    Ok(Column::new(name.into(), millis).cast(&DataType::Duration(TimeUnit::Milliseconds))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample() -> RowSet {
        let df = DataFrame::new(vec![
            text_column(
                "complaint_type",
                vec![
                    Some("Noise - Residential".into()),
                    Some("Harboring Bees/Wasps".into()),
                    None,
                ],
            ),
            float_column("score", vec![Some(1.5), None, Some(3.0)]),
        ])
        .unwrap();
        let rows = RowSet::from_dataframe(df);
        let stamps = [Some(at(2020, 11, 26, 0)), Some(at(2020, 11, 27, 0)), None];
        rows.with_column(timestamp_column("created_date", &stamps).unwrap())
            .unwrap()
    }

    #[test]
    fn timestamps_survive_storage() {
        let rows = sample();
        assert_eq!(rows.kind("created_date").unwrap(), ValueKind::Timestamp);
        let stamps = rows.timestamps("created_date").unwrap();
        assert_eq!(stamps[0], Some(at(2020, 11, 26, 0)));
        assert_eq!(stamps[2], None);
    }

    #[test]
    fn value_reports_tagged_cells() {
        let rows = sample();
        assert_eq!(
            rows.value("complaint_type", 0).unwrap(),
            Value::Text("Noise - Residential".into())
        );
        assert_eq!(rows.value("score", 0).unwrap(), Value::Float(1.5));
        assert!(rows.value("score", 1).unwrap().is_missing());
        assert!(rows.value("score", 99).unwrap().is_missing());
        assert_eq!(
            rows.value("created_date", 1).unwrap(),
            Value::Timestamp(at(2020, 11, 27, 0))
        );
    }

    #[test]
    fn value_reads_integer_duration_and_nan_cells() {
        let rows = sample()
            .with_column(integer_column("year", vec![Some(1890), None, Some(1905)]))
            .unwrap()
            .with_column(float_column("ratio", vec![Some(f64::NAN), Some(0.5), None]))
            .unwrap()
            .with_column(
                duration_column("wait", &[Some(TimeDelta::days(1)), None, None]).unwrap(),
            )
            .unwrap();
        assert_eq!(rows.value("year", 2).unwrap(), Value::Int(1905));
        assert!(rows.value("year", 1).unwrap().is_missing());
        assert!(rows.value("ratio", 0).unwrap().is_missing());
        assert_eq!(rows.value("ratio", 1).unwrap(), Value::Float(0.5));
        assert_eq!(rows.value("wait", 0).unwrap(), Value::Duration(TimeDelta::days(1)));
        assert!(rows.value("created_date", 2).unwrap().is_missing());
        assert!(rows.value("complaint_type", 2).unwrap().is_missing());
    }

    #[test]
    fn unknown_column_is_reported() {
        let rows = sample();
        assert!(matches!(
            rows.texts("borough"),
            Err(FrameError::ColumnNotFound(name)) if name == "borough"
        ));
    }

    #[test]
    fn with_column_rejects_existing_name() {
        let rows = sample();
        let err = rows
            .with_column(float_column("score", vec![None, None, None]))
            .unwrap_err();
        assert!(matches!(err, FrameError::DuplicateColumn(_)));
    }

    #[test]
    fn filters_leave_source_untouched() {
        let rows = sample();
        let bees = rows.filter_contains("complaint_type", "BEE", true).unwrap();
        assert_eq!(bees.height(), 1);
        assert_eq!(rows.height(), 3);

        let noise = rows.filter_eq("complaint_type", "Noise - Residential").unwrap();
        assert_eq!(noise.height(), 1);

        let scored = rows.filter_not_missing("score").unwrap();
        assert_eq!(scored.height(), 2);

        let high = rows.filter_numeric("score", |v| v > 2.0).unwrap();
        assert_eq!(high.height(), 1);

        let listed = rows
            .filter_in("complaint_type", &["Harboring Bees/Wasps", "Other"])
            .unwrap();
        assert_eq!(listed.height(), 1);
    }

    #[test]
    fn calendar_filter_matches_every_field() {
        let rows = sample();
        let thanksgiving = rows
            .filter_calendar(
                "created_date",
                &[(CalendarField::Month, 11), (CalendarField::Day, 26)],
            )
            .unwrap();
        assert_eq!(thanksgiving.height(), 1);
        let none = rows
            .filter_calendar("created_date", &[(CalendarField::Year, 2019)])
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn filter_eq_requires_text() {
        let rows = sample();
        assert!(matches!(
            rows.filter_eq("score", "1.5"),
            Err(FrameError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn time_range_is_half_open() {
        let rows = sample();
        let day = rows
            .filter_time_range("created_date", at(2020, 11, 26, 0), at(2020, 11, 27, 0))
            .unwrap();
        assert_eq!(day.height(), 1);
        assert_eq!(
            day.texts("created_date").unwrap(),
            vec![Some("2020-11-26 00:00:00".to_string())]
        );
    }

    #[test]
    fn numbers_reject_text_columns() {
        let rows = sample();
        assert!(matches!(
            rows.numbers("complaint_type"),
            Err(FrameError::TypeMismatch { expected: "numeric", .. })
        ));
    }
}

//! Type Coercer Module
//! Converts text columns into typed columns. Coercion is total: a value that
//! does not parse becomes missing instead of failing the column.

use crate::data::rowset::{
    float_column, integer_column, timestamp_column, FrameError, RowSet, ValueKind,
};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Layouts tried, in order, when no explicit timestamp format is given.
const PERMISSIVE_DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const PERMISSIVE_DATE_FORMATS: [&str; 5] =
    ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"];

/// Declared target type of a coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoercionTarget {
    /// `format` is a strftime pattern; `None` selects the permissive parser.
    Timestamp {
        #[serde(default)]
        format: Option<String>,
    },
    Integer,
    Float,
}

impl CoercionTarget {
    pub fn timestamp(format: &str) -> Self {
        CoercionTarget::Timestamp {
            format: Some(format.to_string()),
        }
    }

    fn kind(&self) -> ValueKind {
        match self {
            CoercionTarget::Timestamp { .. } => ValueKind::Timestamp,
            CoercionTarget::Integer => ValueKind::Integer,
            CoercionTarget::Float => ValueKind::Float,
        }
    }
}

/// Performs explicit, declared type conversions.
pub struct TypeCoercer;

impl TypeCoercer {
    /// Replace `column` with its typed equivalent under the same name.
    ///
    /// Fails only for an unknown column or an invalid format pattern.
    pub fn coerce(
        rows: &RowSet,
        column: &str,
        target: &CoercionTarget,
    ) -> Result<RowSet, FrameError> {
        if rows.kind(column)? == target.kind() {
            return Ok(rows.clone());
        }

        let raw = rows.texts(column)?;
        let present = raw.iter().filter(|v| v.is_some()).count();

        let (typed, parsed) = match target {
            CoercionTarget::Timestamp { format } => {
                if let Some(format) = format {
                    Self::validate_format(format)?;
                } else {
                    tracing::debug!(column, "using permissive timestamp parsing");
                }
                let values: Vec<Option<NaiveDateTime>> = raw
                    .iter()
                    .map(|v| {
                        v.as_deref()
                            .and_then(|s| Self::parse_timestamp(s, format.as_deref()))
                    })
                    .collect();
                let parsed = values.iter().filter(|v| v.is_some()).count();
                (timestamp_column(column, &values)?, parsed)
            }
            CoercionTarget::Integer => {
                let values: Vec<Option<i64>> = raw
                    .iter()
                    .map(|v| v.as_deref().and_then(Self::parse_integer))
                    .collect();
                let parsed = values.iter().filter(|v| v.is_some()).count();
                (integer_column(column, values), parsed)
            }
            CoercionTarget::Float => {
                let values: Vec<Option<f64>> = raw
                    .iter()
                    .map(|v| v.as_deref().and_then(Self::parse_float))
                    .collect();
                let parsed = values.iter().filter(|v| v.is_some()).count();
                (float_column(column, values), parsed)
            }
        };

        let skipped = present - parsed;
        if skipped > 0 {
            tracing::warn!(column, skipped, "values could not be coerced and are now missing");
        }
        tracing::debug!(column, ?target, parsed, "coerced column");

        rows.replace_column(typed)
    }

    /// Reject patterns chrono cannot interpret.
    pub fn validate_format(format: &str) -> Result<(), FrameError> {
        if format.is_empty() || StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(FrameError::InvalidFormat(format.to_string()));
        }
        Ok(())
    }

    /// Parse one timestamp. Date-only input lands on midnight.
    pub fn parse_timestamp(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        match format {
            Some(format) => Self::parse_with(raw, format),
            None => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_utc())
                .or_else(|| {
                    PERMISSIVE_DATETIME_FORMATS
                        .iter()
                        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
                })
                .or_else(|| {
                    PERMISSIVE_DATE_FORMATS
                        .iter()
                        .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                }),
        }
    }

    fn parse_with(raw: &str, format: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw, format).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    }

    /// Integers, or floats with no fractional part (`"402.0"`).
    pub fn parse_integer(raw: &str) -> Option<i64> {
        let raw = raw.trim();
        raw.parse::<i64>().ok().or_else(|| {
            Self::parse_float(raw)
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }

    /// Finite floats only; `NaN` and infinities are missing.
    pub fn parse_float(raw: &str) -> Option<f64> {
        raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
    }
}

//! Data Loader Module
//! Reads CSV and spreadsheet sources into a [`RowSet`] using Polars and calamine.
//!
//! Every column is read as text. Typing happens later, as an explicit
//! coercion step, so nothing is inferred behind the caller's back.

use crate::data::rowset::{text_column, RowSet, TIMESTAMP_TEXT_FORMAT};
use calamine::{open_workbook_auto, Data, Range, Reader};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal problems with an input source. No partial result is produced.
#[derive(Error, Debug)]
pub enum SourceFormatError {
    #[error("Source not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read tabular data: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Failed to load spreadsheet: {0}")]
    SpreadsheetError(#[from] calamine::Error),
    #[error("Spreadsheet has no worksheets")]
    NoWorksheet,
    #[error("Header row {header_row} is past the end of the source ({rows} rows)")]
    HeaderOutOfRange { header_row: usize, rows: usize },
    #[error("Header cell {index} is blank")]
    BlankHeader { index: usize },
    #[error("Duplicate column name after normalization: {0}")]
    DuplicateHeader(String),
    #[error("Expected column is missing: {0}")]
    MissingColumn(String),
}

/// How raw header names are rewritten at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameRule {
    #[default]
    Verbatim,
    /// Lowercase, whitespace replaced with underscores.
    SnakeLower,
    /// Whitespace replaced with underscores, case kept.
    Underscore,
    /// Only alphanumerics and underscores survive; whitespace becomes underscores.
    StripPunctuation,
}

impl NameRule {
    pub fn apply(self, name: &str) -> String {
        let underscore = |c: char| if c.is_whitespace() { '_' } else { c };
        match self {
            NameRule::Verbatim => name.to_string(),
            NameRule::SnakeLower => name.to_lowercase().chars().map(underscore).collect(),
            NameRule::Underscore => name.chars().map(underscore).collect(),
            NameRule::StripPunctuation => name
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
                .map(underscore)
                .collect(),
        }
    }
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    Spreadsheet,
}

impl SourceKind {
    /// Guess from the file extension; anything that is not a workbook is CSV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("xls" | "xlsx" | "xlsm" | "xlsb" | "ods") => SourceKind::Spreadsheet,
            _ => SourceKind::Csv,
        }
    }
}

/// Options shared by every source kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Stop after this many data rows.
    pub max_rows: Option<usize>,
    /// Raw strings that denote a missing value.
    pub sentinels: Vec<String>,
    pub name_rule: NameRule,
    /// Zero-based row holding the header; earlier rows are skipped.
    pub header_row: usize,
    /// Normalized names that must be present.
    pub required_columns: Vec<String>,
}

/// Loads tabular sources into row-sets.
pub struct DataLoader {
    options: LoadOptions,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl DataLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Load `path`, picking the reader from `kind`.
    pub fn load(&self, path: &Path, kind: SourceKind) -> Result<RowSet, SourceFormatError> {
        match kind {
            SourceKind::Csv => self.load_csv(path),
            SourceKind::Spreadsheet => self.load_spreadsheet(path),
        }
    }

    /// Load a UTF-8 CSV file using Polars.
    pub fn load_csv(&self, path: &Path) -> Result<RowSet, SourceFormatError> {
        if !path.is_file() {
            return Err(SourceFormatError::NotFound(path.to_path_buf()));
        }

        let null_values = (!self.options.sentinels.is_empty()).then(|| {
            NullValues::AllColumns(
                self.options
                    .sentinels
                    .iter()
                    .map(|s| s.as_str().into())
                    .collect(),
            )
        });

        // Schema length 0 reads every column as String
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_skip_rows(self.options.header_row)
            .with_n_rows(self.options.max_rows)
            .with_infer_schema_length(Some(0))
            .with_null_values(null_values)
            .finish()?
            .collect()?;

        let raw: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let names = self.normalize_header(raw)?;
        let columns = df
            .get_columns()
            .iter()
            .zip(&names)
            .map(|(column, name)| column.clone().with_name(name.as_str().into()))
            .collect();

        let rows = RowSet::from_dataframe(DataFrame::new(columns)?);
        tracing::info!(
            path = %path.display(),
            rows = rows.height(),
            columns = names.len(),
            "loaded csv"
        );
        Ok(rows)
    }

    /// Load the first worksheet of a spreadsheet.
    pub fn load_spreadsheet(&self, path: &Path) -> Result<RowSet, SourceFormatError> {
        if !path.is_file() {
            return Err(SourceFormatError::NotFound(path.to_path_buf()));
        }

        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SourceFormatError::NoWorksheet)??;

        let rows = self.rows_from_grid(sheet_grid(&range))?;
        tracing::info!(
            path = %path.display(),
            rows = rows.height(),
            header_row = self.options.header_row,
            "loaded spreadsheet"
        );
        Ok(rows)
    }

    /// Build a row-set from a grid of raw cells, honouring the header offset,
    /// row cap and sentinels.
    pub fn rows_from_grid(
        &self,
        grid: Vec<Vec<Option<String>>>,
    ) -> Result<RowSet, SourceFormatError> {
        let header_row = self.options.header_row;
        let total = grid.len();
        let mut records = grid.into_iter().skip(header_row);

        let header = records.next().ok_or(SourceFormatError::HeaderOutOfRange {
            header_row,
            rows: total,
        })?;
        let raw = header
            .into_iter()
            .enumerate()
            .map(|(index, cell)| {
                cell.filter(|name| !name.trim().is_empty())
                    .ok_or(SourceFormatError::BlankHeader { index })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let names = self.normalize_header(raw)?;

        let limit = self.options.max_rows.unwrap_or(usize::MAX);
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        for record in records.take(limit) {
            for (index, column) in values.iter_mut().enumerate() {
                let cell = record
                    .get(index)
                    .cloned()
                    .flatten()
                    .filter(|raw| !raw.is_empty() && !self.is_sentinel(raw));
                column.push(cell);
            }
        }

        let columns = names
            .iter()
            .zip(values)
            .map(|(name, column)| text_column(name, column))
            .collect();
        Ok(RowSet::from_dataframe(DataFrame::new(columns)?))
    }

    fn is_sentinel(&self, raw: &str) -> bool {
        self.options.sentinels.iter().any(|s| s == raw)
    }

    fn normalize_header(&self, raw: Vec<String>) -> Result<Vec<String>, SourceFormatError> {
        let names: Vec<String> = raw
            .iter()
            .map(|name| self.options.name_rule.apply(name))
            .collect();

        let mut seen = HashSet::new();
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(SourceFormatError::BlankHeader { index });
            }
            if !seen.insert(name.as_str()) {
                return Err(SourceFormatError::DuplicateHeader(name.clone()));
            }
        }

        if let Some(missing) = self
            .options
            .required_columns
            .iter()
            .find(|required| !seen.contains(required.as_str()))
        {
            return Err(SourceFormatError::MissingColumn(missing.clone()));
        }

        Ok(names)
    }
}

/// Text grid of a worksheet, indexed from the first sheet row.
///
/// A calamine range begins at the first non-empty cell, so leading blank
/// rows are restored here to keep `header_row` an absolute sheet row.
fn sheet_grid(range: &Range<Data>) -> Vec<Vec<Option<String>>> {
    let blank_rows = range.start().map_or(0, |(row, _)| row as usize);
    std::iter::repeat_with(Vec::new)
        .take(blank_rows)
        .chain(range.rows().map(|row| row.iter().map(cell_text).collect()))
        .collect()
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(d) if d.is_datetime() => d
            .as_datetime()
            .map(|t| t.format(TIMESTAMP_TEXT_FORMAT).to_string()),
        Data::DateTime(d) => Some(d.as_f64().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&str]) -> Vec<Option<String>> {
        raw.iter()
            .map(|s| (!s.is_empty()).then(|| s.to_string()))
            .collect()
    }

    fn bloom_grid() -> Vec<Vec<Option<String>>> {
        vec![
            cells(&["Phenological data for Kyoto", ""]),
            cells(&["Column descriptions follow", ""]),
            cells(&["AD", "Reference Name"]),
            cells(&["801", "-"]),
            cells(&["812", "NIHON-KOKI"]),
            cells(&["815", "NaN"]),
        ]
    }

    #[test]
    fn name_rules() {
        assert_eq!(NameRule::SnakeLower.apply("Created Date"), "created_date");
        assert_eq!(
            NameRule::Underscore.apply("Full-flowering date (DOY)"),
            "Full-flowering_date_(DOY)"
        );
        assert_eq!(
            NameRule::StripPunctuation.apply("Full-flowering date (DOY)"),
            "Fullflowering_date_DOY"
        );
        assert_eq!(NameRule::Verbatim.apply("Agency Name"), "Agency Name");
    }

    #[test]
    fn source_kind_from_extension() {
        assert_eq!(
            SourceKind::from_path(Path::new("KyotoFullFlower7.xls")),
            SourceKind::Spreadsheet
        );
        assert_eq!(SourceKind::from_path(Path::new("subset.csv")), SourceKind::Csv);
    }

    #[test]
    fn grid_honours_header_offset_and_sentinels() {
        let loader = DataLoader::new(LoadOptions {
            header_row: 2,
            sentinels: vec!["NaN".into(), "-".into()],
            name_rule: NameRule::Underscore,
            ..Default::default()
        });
        let rows = loader.rows_from_grid(bloom_grid()).unwrap();
        assert_eq!(rows.column_names(), vec!["AD", "Reference_Name"]);
        assert_eq!(
            rows.texts("Reference_Name").unwrap(),
            vec![None, Some("NIHON-KOKI".to_string()), None]
        );
    }

    #[test]
    fn grid_row_cap_truncates() {
        let loader = DataLoader::new(LoadOptions {
            header_row: 2,
            max_rows: Some(2),
            ..Default::default()
        });
        let rows = loader.rows_from_grid(bloom_grid()).unwrap();
        assert_eq!(
            rows.texts("AD").unwrap(),
            vec![Some("801".to_string()), Some("812".to_string())]
        );
    }

    #[test]
    fn header_past_end_is_fatal() {
        let loader = DataLoader::new(LoadOptions {
            header_row: 25,
            ..Default::default()
        });
        assert!(matches!(
            loader.rows_from_grid(bloom_grid()),
            Err(SourceFormatError::HeaderOutOfRange { header_row: 25, rows: 6 })
        ));
    }

    #[test]
    fn wrong_offset_hits_blank_header() {
        let loader = DataLoader::new(LoadOptions::default());
        assert!(matches!(
            loader.rows_from_grid(bloom_grid()),
            Err(SourceFormatError::BlankHeader { index: 1 })
        ));
    }

    #[test]
    fn duplicate_and_required_names() {
        let loader = DataLoader::new(LoadOptions {
            name_rule: NameRule::SnakeLower,
            ..Default::default()
        });
        let grid = vec![cells(&["Agency", "AGENCY"]), cells(&["NYPD", "HPD"])];
        assert!(matches!(
            loader.rows_from_grid(grid),
            Err(SourceFormatError::DuplicateHeader(name)) if name == "agency"
        ));

        let loader = DataLoader::new(LoadOptions {
            name_rule: NameRule::SnakeLower,
            required_columns: vec!["borough".into()],
            ..Default::default()
        });
        let grid = vec![cells(&["Agency"]), cells(&["NYPD"])];
        assert!(matches!(
            loader.rows_from_grid(grid),
            Err(SourceFormatError::MissingColumn(name)) if name == "borough"
        ));
    }

    #[test]
    fn sheet_grid_keeps_leading_blank_rows() {
        let mut range = Range::new((2, 0), (3, 1));
        range.set_value((2, 0), Data::String("AD".into()));
        range.set_value((2, 1), Data::String("Reference Name".into()));
        range.set_value((3, 0), Data::Float(801.0));
        range.set_value((3, 1), Data::String("NIHON-KOKI".into()));

        let grid = sheet_grid(&range);
        assert_eq!(grid.len(), 4);
        assert!(grid[0].is_empty() && grid[1].is_empty());
        assert_eq!(grid[2], cells(&["AD", "Reference Name"]));

        let loader = DataLoader::new(LoadOptions {
            header_row: 2,
            ..Default::default()
        });
        let rows = loader.rows_from_grid(grid).unwrap();
        assert_eq!(rows.column_names(), vec!["AD", "Reference Name"]);
        assert_eq!(rows.texts("AD").unwrap(), vec![Some("801".to_string())]);
    }

    #[test]
    fn datetime_cells_read_as_timestamp_text() {
        use calamine::{ExcelDateTime, ExcelDateTimeType};

        // 2020-11-26 13:15:00
        let stamp = Data::DateTime(ExcelDateTime::new(
            44161.552083333336,
            ExcelDateTimeType::DateTime,
            false,
        ));
        assert_eq!(cell_text(&stamp), Some("2020-11-26 13:15:00".to_string()));
        assert_eq!(
            cell_text(&Data::DateTimeIso("2020-11-26T13:15:00".into())),
            Some("2020-11-26T13:15:00".to_string())
        );
        assert_eq!(cell_text(&Data::Empty), None);
    }

    #[test]
    fn missing_file_is_reported() {
        let loader = DataLoader::default();
        assert!(matches!(
            loader.load_csv(Path::new("/nonexistent/subset.csv")),
            Err(SourceFormatError::NotFound(_))
        ));
    }
}

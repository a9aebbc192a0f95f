//! Dataset configuration
//!
//! A [`DatasetConfig`] names the source file, how to load it, which columns
//! to coerce and where charts go. Two presets cover the bundled recipes; any
//! field can be overridden from a JSON file or the command line.

use crate::data::{CoercionTarget, LoadOptions, NameRule, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Timestamp layout of the 311 export, e.g. `03/14/2019 11:52:07 PM`.
pub const SERVICE_REQUEST_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Guessed from the extension when absent.
    #[serde(default)]
    pub kind: Option<SourceKind>,
    #[serde(default)]
    pub options: LoadOptions,
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        self.kind.unwrap_or_else(|| SourceKind::from_path(&self.path))
    }
}

/// One explicit type coercion, applied after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionSpec {
    pub column: String,
    pub target: CoercionTarget,
}

impl CoercionSpec {
    pub fn new(column: &str, target: CoercionTarget) -> Self {
        Self {
            column: column.to_string(),
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Charts are discarded when unset.
    pub out_dir: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            out_dir: None,
            width: 1000,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub coercions: Vec<CoercionSpec>,
    #[serde(default)]
    pub charts: ChartConfig,
}

impl DatasetConfig {
    /// NYC 311 service request export.
    pub fn service_requests() -> Self {
        let timestamp = CoercionTarget::timestamp(SERVICE_REQUEST_TIMESTAMP_FORMAT);
        Self {
            source: SourceConfig {
                path: PathBuf::from("subset.csv"),
                kind: Some(SourceKind::Csv),
                options: LoadOptions {
                    max_rows: Some(7_000_000),
                    sentinels: vec!["UNKNOWN".to_string()],
                    name_rule: NameRule::SnakeLower,
                    header_row: 0,
                    required_columns: [
                        "created_date",
                        "closed_date",
                        "agency",
                        "complaint_type",
                        "descriptor",
                        "borough",
                        "open_data_channel_type",
                    ]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                },
            },
            coercions: vec![
                CoercionSpec::new("created_date", timestamp.clone()),
                CoercionSpec::new("closed_date", timestamp),
            ],
            charts: ChartConfig::default(),
        }
    }

    /// Kyoto full-flowering workbook. The header sits on row 26 below a
    /// block of notes.
    pub fn bloom_dates() -> Self {
        Self {
            source: SourceConfig {
                path: PathBuf::from("KyotoFullFlower7.xls"),
                kind: Some(SourceKind::Spreadsheet),
                options: LoadOptions {
                    max_rows: None,
                    sentinels: vec!["NaN".to_string(), "-".to_string()],
                    name_rule: NameRule::Underscore,
                    header_row: 25,
                    required_columns: [
                        "AD",
                        "Full-flowering_date_(DOY)",
                        "Full-flowering_date",
                        "Data_type_code",
                        "Reference_Name",
                    ]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
                },
            },
            coercions: vec![
                CoercionSpec::new("AD", CoercionTarget::Integer),
                CoercionSpec::new("Full-flowering_date_(DOY)", CoercionTarget::Float),
                CoercionSpec::new("Full-flowering_date", CoercionTarget::Float),
                CoercionSpec::new("Data_type_code", CoercionTarget::Integer),
            ],
            charts: ChartConfig::default(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        // an explicit path re-derives the kind from its extension
        self.source.kind = Some(SourceKind::from_path(&path));
        self.source.path = path;
        self
    }

    pub fn with_max_rows(mut self, rows: usize) -> Self {
        self.source.options.max_rows = Some(rows);
        self
    }

    pub fn with_chart_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.charts.out_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_describe_their_sources() {
        let requests = DatasetConfig::service_requests();
        assert_eq!(requests.source.kind(), SourceKind::Csv);
        assert_eq!(requests.source.options.sentinels, vec!["UNKNOWN"]);
        assert_eq!(requests.coercions.len(), 2);

        let blooms = DatasetConfig::bloom_dates();
        assert_eq!(blooms.source.kind(), SourceKind::Spreadsheet);
        assert_eq!(blooms.source.options.header_row, 25);
        assert!(blooms.charts.out_dir.is_none());
    }

    #[test]
    fn overrides() {
        let config = DatasetConfig::service_requests()
            .with_input("/data/requests.xlsx")
            .with_max_rows(500)
            .with_chart_dir("out");
        assert_eq!(config.source.kind(), SourceKind::Spreadsheet);
        assert_eq!(config.source.options.max_rows, Some(500));
        assert_eq!(config.charts.out_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn parses_minimal_json() {
        let config = DatasetConfig::from_json_str(
            r#"{
                "source": {
                    "path": "requests.csv",
                    "options": { "sentinels": ["N/A"], "name_rule": "snake_lower" }
                },
                "coercions": [
                    { "column": "created_date", "target": { "type": "timestamp" } },
                    { "column": "count", "target": { "type": "integer" } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.source.kind(), SourceKind::Csv);
        assert_eq!(config.source.options.name_rule, NameRule::SnakeLower);
        assert_eq!(config.source.options.header_row, 0);
        assert_eq!(config.coercions[0].target, CoercionTarget::Timestamp { format: None });
        assert_eq!(config.charts.width, 1000);
    }

    #[test]
    fn json_round_trip_of_preset() {
        let preset = DatasetConfig::bloom_dates();
        let json = serde_json::to_string(&preset).unwrap();
        assert_eq!(DatasetConfig::from_json_str(&json).unwrap(), preset);
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = DatasetConfig::from_json_file(Path::new("/nonexistent/tabula.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tabula.json"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            DatasetConfig::from_json_str("{ \"source\": 3 }"),
            Err(ConfigError::Parse(_))
        ));
    }
}

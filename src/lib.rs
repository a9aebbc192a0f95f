//! Tabula - Tabular data pipeline for exploratory CSV & spreadsheet analysis
//!
//! Sources are loaded as text, coerced to declared types, extended with
//! derived columns and summarized by grouping, pivoting and resampling.
//! Charts go to any [`charts::PlotSink`].

pub mod charts;
pub mod config;
pub mod data;
pub mod pipeline;
pub mod recipes;
pub mod stats;

pub use config::{ConfigError, DatasetConfig};
pub use data::{RowSet, Value, ValueKind};
pub use pipeline::{prepare, PipelineError};

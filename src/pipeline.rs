//! Load-then-coerce front half of every analysis.

use crate::config::{CoercionSpec, DatasetConfig};
use crate::data::{DataLoader, FrameError, RowSet, SourceFormatError, TypeCoercer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceFormatError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Load the configured source and apply its coercions in order.
pub fn prepare(config: &DatasetConfig) -> Result<RowSet, PipelineError> {
    let loader = DataLoader::new(config.source.options.clone());
    let rows = loader.load(&config.source.path, config.source.kind())?;
    let rows = apply_coercions(rows, &config.coercions)?;
    tracing::info!(
        path = %config.source.path.display(),
        rows = rows.height(),
        columns = rows.column_names().len(),
        "dataset prepared"
    );
    Ok(rows)
}

pub fn apply_coercions(rows: RowSet, coercions: &[CoercionSpec]) -> Result<RowSet, FrameError> {
    coercions.iter().try_fold(rows, |rows, coercion| {
        TypeCoercer::coerce(&rows, &coercion.column, &coercion.target)
    })
}

//! Data module - Loading, typing and deriving columns

mod coercer;
mod loader;
mod processor;
pub(crate) mod rowset;

pub use coercer::{CoercionTarget, TypeCoercer};
pub use loader::{DataLoader, LoadOptions, NameRule, SourceFormatError, SourceKind};
pub use processor::{CalendarField, DataProcessor};
pub use rowset::{FrameError, RowSet, Value, ValueKind, TIMESTAMP_TEXT_FORMAT};

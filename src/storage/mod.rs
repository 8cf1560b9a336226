mod database;
mod history;

pub use database::{HistoryStore, StorageError};
pub use history::{HistoryRecord, HistoryRecordSummary, RESULT_FORMAT_VERSION};

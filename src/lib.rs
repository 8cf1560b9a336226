pub mod analysis;
pub mod batch;
pub mod cdp;
pub mod commands;
pub mod compare;
pub mod config;
pub mod scanner;
pub mod state;
pub mod storage;

pub use analysis::{analyze, Analyzer, Findings};
pub use batch::{BatchItem, BatchRunner, CancelHandle, ProgressEvent, ProgressStatus};
pub use cdp::{MetricComputer, ScanError, ScanResult};
pub use compare::{compare, Comparison, ComparisonRow, Verdict};
pub use config::{AppConfig, Thresholds};
pub use scanner::{PageScanner, Scanner};
pub use state::AppState;
pub use storage::{HistoryStore, StorageError};

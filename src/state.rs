use crate::analysis::Analyzer;
use crate::config::AppConfig;
use crate::scanner::Scanner;
use crate::storage::HistoryStore;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub scanner: Arc<Scanner>,
    pub store: Arc<HistoryStore>,
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(config: AppConfig, store: HistoryStore) -> Self {
        let store = Arc::new(store);
        Self {
            scanner: Arc::new(Scanner::new(config.scan.clone(), Some(store.clone()))),
            analyzer: Analyzer::new(config.thresholds.clone()),
            store,
            config,
        }
    }
}

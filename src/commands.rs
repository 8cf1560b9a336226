use crate::analysis::Findings;
use crate::batch::{fastest, BatchItem, BatchRunner, CancelHandle, ProgressEvent};
use crate::cdp::{InitiatorType, ResourceEntry, ScanResult};
use crate::compare::{compare, Comparison, ScoreCard};
use crate::scanner::ScanOptions;
use crate::state::AppState;
use crate::storage::{HistoryRecord, HistoryRecordSummary};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

pub const NOT_FOUND: &str = "data not found";

/// A scan together with what the analyzer made of it
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub result: ScanResult,
    pub findings: Findings,
    pub scores: ScoreCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveComparison {
    pub before: ScanReport,
    pub after: ScanReport,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    /// URL with the lowest `ttfb + fullLoad` among successful scans
    pub fastest: Option<String>,
}

fn report(state: &AppState, result: ScanResult) -> ScanReport {
    ScanReport {
        findings: state.analyzer.analyze(&result),
        scores: ScoreCard::from_result(&result),
        result,
    }
}

// ============ Scan Commands ============

pub async fn scan_url(
    state: &AppState,
    url: &str,
    screenshot: Option<PathBuf>,
    save_to_history: Option<bool>,
) -> Result<ScanReport, String> {
    let options = ScanOptions {
        screenshot,
        save_to_history,
    };
    let result = state
        .scanner
        .scan_with(url, &options)
        .await
        .map_err(|e| e.to_string())?;
    Ok(report(state, result))
}

pub fn analyze_result(state: &AppState, result: &ScanResult) -> Findings {
    state.analyzer.analyze(result)
}

pub fn filter_resources(result: &ScanResult, kind: Option<InitiatorType>) -> Vec<ResourceEntry> {
    match kind {
        Some(kind) => result.resources_of(kind).cloned().collect(),
        None => result.resources.clone(),
    }
}

pub async fn batch_scan<F>(
    state: &AppState,
    urls: &[String],
    cancel: CancelHandle,
    on_progress: F,
) -> Result<BatchReport, String>
where
    F: FnMut(ProgressEvent),
{
    if urls.is_empty() {
        return Err("No URLs to scan".to_string());
    }

    let runner = BatchRunner::with_cancel(state.scanner.clone(), cancel);
    let items = runner.run(urls, on_progress).await;
    let fastest = fastest(&items).map(|item| item.url.clone());
    Ok(BatchReport { items, fastest })
}

// ============ Comparison Commands ============

/// Scan both URLs one after the other and compare them
pub async fn compare_live(
    state: &AppState,
    before_url: &str,
    after_url: &str,
) -> Result<LiveComparison, String> {
    let before = scan_url(state, before_url, None, None).await?;
    let after = scan_url(state, after_url, None, None).await?;
    let comparison = compare(&before.result, &after.result);
    Ok(LiveComparison {
        before,
        after,
        comparison,
    })
}

pub fn compare_history(state: &AppState, before_id: i64, after_id: i64) -> Result<Comparison, String> {
    let (before, after) = state
        .store
        .load_pair(before_id, after_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| NOT_FOUND.to_string())?;
    Ok(compare(&before, &after))
}

// ============ History Commands ============

pub fn list_history(state: &AppState, limit: Option<u32>) -> Result<Vec<HistoryRecordSummary>, String> {
    state.store.list_summaries(limit).map_err(|e| e.to_string())
}

pub fn get_history(state: &AppState, id: i64) -> Result<HistoryRecord, String> {
    state
        .store
        .get_record(id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| NOT_FOUND.to_string())
}

pub fn delete_history(state: &AppState, id: i64) -> Result<(), String> {
    state.store.delete(id).map_err(|e| e.to_string())
}

pub fn clear_history(state: &AppState) -> Result<(), String> {
    info!("Clearing scan history");
    state.store.clear().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::{sample_timing, MetricComputer, RawTelemetry, VitalsRaw};
    use crate::config::AppConfig;
    use crate::storage::HistoryStore;
    use chrono::Utc;

    fn create_test_state() -> AppState {
        AppState::new(AppConfig::default(), HistoryStore::in_memory().unwrap())
    }

    fn sample_result(url: &str) -> ScanResult {
        let now = Utc::now();
        MetricComputer::compute(
            RawTelemetry {
                navigation: sample_timing(),
                resources: vec![],
                vitals: VitalsRaw::default(),
            },
            url,
            now,
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_compare_history_missing_id() {
        let state = create_test_state();
        let id = state.store.try_save(&sample_result("https://a.test/")).unwrap();
        assert_eq!(compare_history(&state, id, id + 1).unwrap_err(), NOT_FOUND);
        assert_eq!(get_history(&state, 999).unwrap_err(), NOT_FOUND);
    }

    #[test]
    fn test_compare_history_same_record_ties() {
        let state = create_test_state();
        let id = state.store.try_save(&sample_result("https://a.test/")).unwrap();
        let cmp = compare_history(&state, id, id).unwrap();
        assert_eq!(cmp.verdict, crate::compare::Verdict::Tie);
        assert!(cmp.rows.iter().all(|r| r.delta == 0.0));
    }

    #[test]
    fn test_history_commands() {
        let state = create_test_state();
        let a = state.store.try_save(&sample_result("https://a.test/")).unwrap();
        state.store.try_save(&sample_result("https://b.test/")).unwrap();

        assert_eq!(list_history(&state, None).unwrap().len(), 2);
        assert_eq!(get_history(&state, a).unwrap().result.url, "https://a.test/");

        delete_history(&state, a).unwrap();
        assert_eq!(list_history(&state, None).unwrap().len(), 1);

        clear_history(&state).unwrap();
        assert!(list_history(&state, Some(10)).unwrap().is_empty());
    }

    #[test]
    fn test_analyze_result_uses_configured_thresholds() {
        let mut config = AppConfig::default();
        config.thresholds.ttfb_ms = 100.0;
        let state = AppState::new(config, HistoryStore::in_memory().unwrap());

        // sample ttfb is 200ms
        let findings = analyze_result(&state, &sample_result("https://a.test/"));
        assert_eq!(findings.len(), 1);
        assert!(findings.issues[0].starts_with("Slow server response"));
    }

    #[tokio::test]
    async fn test_batch_scan_rejects_empty_input() {
        let state = create_test_state();
        assert!(batch_scan(&state, &[], CancelHandle::default(), |_| {}).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_url_invalid() {
        let state = create_test_state();
        let err = scan_url(&state, "not a url", None, Some(false)).await.unwrap_err();
        assert!(err.starts_with("Invalid URL"));
    }
}

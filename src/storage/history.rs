use crate::cdp::ScanResult;
use serde::{Deserialize, Serialize};

/// Current layout of the `result_json` column
pub const RESULT_FORMAT_VERSION: u32 = 1;

/// Listing projection of a stored scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecordSummary {
    pub id: i64,
    pub url: String,
    pub ttfb: f64,
    pub full_load: f64,
    pub lcp: f64,
    pub total_size: u64,
    pub total_requests: usize,
    pub created_at: String,
}

/// A persisted scan with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub created_at: String,
    pub result: ScanResult,
}

/// Versioned wrapper written to `result_json`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredResult<R> {
    pub format_version: u32,
    pub result: R,
}

impl<'a> StoredResult<&'a ScanResult> {
    pub fn current(result: &'a ScanResult) -> Self {
        Self {
            format_version: RESULT_FORMAT_VERSION,
            result,
        }
    }
}

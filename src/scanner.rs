use crate::cdp::{MetricComputer, ScanError, ScanResult, TelemetryClient};
use crate::config::ScanSettings;
use crate::storage::HistoryStore;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Anything that can turn a URL into a `ScanResult`.
///
/// `BatchRunner` and the live comparison only depend on this, so tests can
/// drive them without a browser.
pub trait PageScanner: Send + Sync {
    fn scan(&self, url: &str) -> impl Future<Output = Result<ScanResult, ScanError>> + Send;
}

/// Per-call scan options
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub screenshot: Option<PathBuf>,
    /// Overrides `ScanSettings::save_to_history` when set
    pub save_to_history: Option<bool>,
}

/// Browser-backed scanner: collect, compute, optionally persist
pub struct Scanner {
    client: TelemetryClient,
    store: Option<Arc<HistoryStore>>,
}

impl Scanner {
    pub fn new(settings: ScanSettings, store: Option<Arc<HistoryStore>>) -> Self {
        Self {
            client: TelemetryClient::new(settings),
            store,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        self.client.settings()
    }

    #[instrument(skip(self, options))]
    pub async fn scan_with(&self, url: &str, options: &ScanOptions) -> Result<ScanResult, ScanError> {
        let url = validate_url(url)?;
        let screenshot = options
            .screenshot
            .clone()
            .or_else(|| self.default_screenshot_path());

        let collected = self.client.collect(&url, screenshot.as_deref()).await?;
        let mut result = MetricComputer::compute(
            collected.raw,
            &url,
            collected.started_at,
            collected.ended_at,
        )?;
        result.screenshot_ref = collected
            .screenshot
            .map(|path| path.to_string_lossy().into_owned());

        info!(
            "Scanned {}: ttfb={:.0}ms load={:.0}ms requests={}",
            result.url, result.metrics.ttfb, result.metrics.full_load, result.total_requests
        );

        let save = options
            .save_to_history
            .unwrap_or(self.settings().save_to_history);
        if save {
            if let Some(store) = &self.store {
                store.save(&result);
            }
        }

        Ok(result)
    }

    fn default_screenshot_path(&self) -> Option<PathBuf> {
        self.settings()
            .screenshot_dir
            .as_deref()
            .map(|dir: &Path| dir.join(format!("{}.png", Uuid::new_v4())))
    }
}

impl PageScanner for Scanner {
    async fn scan(&self, url: &str) -> Result<ScanResult, ScanError> {
        self.scan_with(url, &ScanOptions::default()).await
    }
}

/// Accept http(s) URLs only, returning the trimmed form
pub fn validate_url(raw: &str) -> Result<String, ScanError> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed).map_err(|e| ScanError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ScanError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(validate_url("  https://example.com/ ").unwrap(), "https://example.com/");
        assert!(validate_url("http://localhost:8080/a?b=c").is_ok());
        assert!(matches!(validate_url(""), Err(ScanError::InvalidUrl { .. })));
        assert!(matches!(validate_url("example.com"), Err(ScanError::InvalidUrl { .. })));
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(ScanError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_default_screenshot_path_uses_dir() {
        let scanner = Scanner::new(
            ScanSettings {
                screenshot_dir: Some(PathBuf::from("/tmp/shots")),
                ..ScanSettings::default()
            },
            None,
        );
        let path = scanner.default_screenshot_path().unwrap();
        assert!(path.starts_with("/tmp/shots"));
        assert_eq!(path.extension().unwrap(), "png");

        let scanner = Scanner::new(ScanSettings::default(), None);
        assert!(scanner.default_screenshot_path().is_none());
    }
}

use super::metrics::{parse_telemetry, TelemetryError};
use super::types::{BrowserVersion, RawTelemetry};
use crate::config::ScanSettings;
use chrono::{DateTime, Utc};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Injected before navigation; exposes `window.getVitals()`
pub const VITALS_SCRIPT: &str = include_str!("vitals.js");

const NAVIGATION_TIMING_JS: &str = "JSON.stringify(window.performance.timing)";
const RESOURCE_TIMING_JS: &str = "JSON.stringify(window.performance.getEntriesByType('resource'))";
const VITALS_JS: &str = "JSON.stringify(window.getVitals())";

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to start browser: {0}")]
    Launch(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl ScanError {
    /// Failures worth skipping past in a batch rather than treating as bad data
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScanError::Launch(_)
                | ScanError::Navigation(_)
                | ScanError::Timeout(_)
                | ScanError::Browser(_)
        )
    }
}

/// Telemetry for one navigation plus its wall-clock bounds
#[derive(Debug, Clone)]
pub struct CollectedTelemetry {
    pub raw: RawTelemetry,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub screenshot: Option<PathBuf>,
}

struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Launched by us, so ours to shut down
    owned: bool,
}

/// Drives a Chromium instance over CDP to collect page telemetry
pub struct TelemetryClient {
    settings: ScanSettings,
}

impl TelemetryClient {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Look up the browser-level WebSocket URL of a running Chromium
    pub async fn discover_websocket_url(
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<String, ScanError> {
        let url = format!("http://{}:{}/json/version", host, port);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScanError::Launch(e.to_string()))?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScanError::Launch(e.to_string()))?;

        let version: BrowserVersion = response
            .json()
            .await
            .map_err(|e| ScanError::Launch(e.to_string()))?;

        debug!(
            "Found browser {:?} at {}",
            version.browser, version.web_socket_debugger_url
        );
        Ok(version.web_socket_debugger_url)
    }

    async fn open_session(&self) -> Result<BrowserSession, ScanError> {
        let (browser, mut handler, owned) = match self.settings.remote_debugging_port {
            Some(port) => {
                let ws_url = Self::discover_websocket_url(
                    &self.settings.remote_host,
                    port,
                    self.settings.navigation_timeout(),
                )
                .await?;
                let (browser, handler) = Browser::connect(ws_url)
                    .await
                    .map_err(|e| ScanError::Launch(e.to_string()))?;
                (browser, handler, false)
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .request_timeout(self.settings.navigation_timeout());
                if !self.settings.headless {
                    builder = builder.with_head();
                }
                if let Some(path) = &self.settings.chrome_executable {
                    builder = builder.chrome_executable(path);
                }
                let config = builder.build().map_err(ScanError::Launch)?;
                let (browser, handler) = Browser::launch(config)
                    .await
                    .map_err(|e| ScanError::Launch(e.to_string()))?;
                (browser, handler, true)
            }
        };

        // Spawn handler task
        let handler = tokio::spawn(async move {
            drive_handler(&mut handler).await;
        });

        Ok(BrowserSession {
            browser,
            handler,
            owned,
        })
    }

    async fn close_session(session: BrowserSession) {
        let BrowserSession {
            mut browser,
            handler,
            owned,
        } = session;

        if owned {
            let shutdown = async {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    warn!("Failed to wait for browser exit: {}", e);
                }
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
                warn!("Browser did not shut down within {:?}", CLOSE_TIMEOUT);
            }
        }
        handler.abort();
    }

    /// Browser setup, navigation and evaluation share one deadline set by the configured timeout.
    #[instrument(skip(self))]
    pub async fn collect(
        &self,
        url: &str,
        screenshot: Option<&Path>,
    ) -> Result<CollectedTelemetry, ScanError> {
        let timeout = self.settings.navigation_timeout();
        let deadline = Instant::now() + timeout;

        let session = match tokio::time::timeout_at(deadline, self.open_session()).await {
            Ok(session) => session?,
            Err(_) => return Err(Self::timed_out(url, timeout)),
        };

        let outcome =
            tokio::time::timeout_at(deadline, Self::measure(&session.browser, url, screenshot)).await;

        Self::close_session(session).await;

        outcome.unwrap_or_else(|_| Err(Self::timed_out(url, timeout)))
    }

    fn timed_out(url: &str, timeout: Duration) -> ScanError {
        warn!("Scan of {} timed out after {:?}", url, timeout);
        ScanError::Timeout(timeout)
    }

    async fn measure(
        browser: &Browser,
        url: &str,
        screenshot: Option<&Path>,
    ) -> Result<CollectedTelemetry, ScanError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScanError::Browser(e.to_string()))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(VITALS_SCRIPT))
            .await
            .map_err(|e| ScanError::Browser(e.to_string()))?;

        let started_at = Utc::now();
        info!("Navigating to {}", url);

        page.goto(url)
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScanError::Navigation(e.to_string()))?;

        let screenshot = match screenshot {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| ScanError::Browser(e.to_string()))?;
                }
                page.save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
                    .await
                    .map_err(|e| ScanError::Browser(e.to_string()))?;
                Some(path.to_path_buf())
            }
            None => None,
        };

        let navigation = Self::evaluate_json(&page, NAVIGATION_TIMING_JS).await?;
        let resources = Self::evaluate_json(&page, RESOURCE_TIMING_JS).await?;
        let vitals = Self::evaluate_json(&page, VITALS_JS).await?;

        let ended_at = Utc::now();

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }

        let raw = parse_telemetry(&navigation, &resources, &vitals)?;
        debug!("Collected {} resource entries from {}", raw.resources.len(), url);

        Ok(CollectedTelemetry {
            raw,
            started_at,
            ended_at,
            screenshot,
        })
    }

    async fn evaluate_json(page: &Page, expression: &str) -> Result<String, ScanError> {
        let result = page
            .evaluate(expression.to_string())
            .await
            .map_err(|e| ScanError::Browser(e.to_string()))?;

        result
            .into_value::<String>()
            .map_err(|e| TelemetryError::Malformed(format!("{}: {}", expression, e)).into())
    }
}

/// Poll the CDP event stream until the connection closes. Pending commands
/// only resolve while this is polled, so errors (e.g. events this
/// chromiumoxide version cannot decode) are logged and skipped.
async fn drive_handler<S, T, E>(events: &mut S) -> usize
where
    S: Stream<Item = Result<T, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut polled = 0;
    while let Some(event) = events.next().await {
        polled += 1;
        if let Err(e) = event {
            debug!("Browser handler error: {}", e);
        }
    }
    polled
}

//! Sequential multi-URL scanning with progress events.
//!
//! URLs are scanned one at a time, in input order, so at most one browser
//! session is alive per runner. Every URL gets a `Scanning` event followed by
//! exactly one `Done` or `Error` event. A failing URL is recorded as `None`
//! and the batch moves on.

use crate::cdp::ScanResult;
use crate::scanner::PageScanner;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ProgressStatus {
    Scanning,
    Done,
    Error(String),
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::Scanning => f.write_str("scanning"),
            ProgressStatus::Done => f.write_str("done"),
            ProgressStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Progress of one URL within a batch
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub index: usize,
    pub url: String,
    pub status: ProgressStatus,
    pub result: Option<Arc<ScanResult>>,
}

/// Outcome for one input URL; `result` is `None` when the scan failed
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub url: String,
    pub result: Option<Arc<ScanResult>>,
}

/// Cooperative stop signal, checked before each URL's scan starts
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchRunner<S> {
    scanner: Arc<S>,
    cancel: CancelHandle,
}

impl<S: PageScanner + 'static> BatchRunner<S> {
    pub fn new(scanner: Arc<S>) -> Self {
        Self {
            scanner,
            cancel: CancelHandle::default(),
        }
    }

    /// Share an existing stop signal, e.g. one wired to Ctrl+C
    pub fn with_cancel(scanner: Arc<S>, cancel: CancelHandle) -> Self {
        Self { scanner, cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Scan `urls` in order, reporting progress through `on_progress`
    pub async fn run<F>(&self, urls: &[String], mut on_progress: F) -> Vec<BatchItem>
    where
        F: FnMut(ProgressEvent),
    {
        info!("Starting batch of {} URL(s)", urls.len());
        let mut items = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Batch cancelled after {} of {} URL(s)", index, urls.len());
                break;
            }

            on_progress(ProgressEvent {
                index,
                url: url.clone(),
                status: ProgressStatus::Scanning,
                result: None,
            });

            let result = match self.scanner.scan(url).await {
                Ok(result) => {
                    let result = Arc::new(result);
                    on_progress(ProgressEvent {
                        index,
                        url: url.clone(),
                        status: ProgressStatus::Done,
                        result: Some(result.clone()),
                    });
                    Some(result)
                }
                Err(e) => {
                    warn!("Batch scan of {} failed: {}", url, e);
                    on_progress(ProgressEvent {
                        index,
                        url: url.clone(),
                        status: ProgressStatus::Error(e.to_string()),
                        result: None,
                    });
                    None
                }
            };

            items.push(BatchItem {
                url: url.clone(),
                result,
            });
        }

        let succeeded = items.iter().filter(|i| i.result.is_some()).count();
        info!("Batch finished: {}/{} succeeded", succeeded, items.len());
        items
    }

    /// Run on a separate task; progress arrives on the returned channel and
    /// the channel closes when the batch is finished.
    pub fn spawn(
        self,
        urls: Vec<String>,
    ) -> (mpsc::UnboundedReceiver<ProgressEvent>, JoinHandle<Vec<BatchItem>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            self.run(&urls, |event| {
                // receiver gone means nobody is watching; keep scanning anyway
                let _ = tx.send(event);
            })
            .await
        });
        (rx, handle)
    }
}

/// The successful item with the lowest `ttfb + fullLoad`; first wins ties
pub fn fastest(items: &[BatchItem]) -> Option<&BatchItem> {
    items
        .iter()
        .filter_map(|item| item.result.as_ref().map(|r| (item, r.speed_score())))
        .fold(None, |best: Option<(&BatchItem, f64)>, (item, score)| match best {
            Some((_, best_score)) if best_score <= score => best,
            _ => Some((item, score)),
        })
        .map(|(item, _)| item)
}

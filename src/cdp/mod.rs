mod client;
mod metrics;
mod types;

pub use client::{CollectedTelemetry, ScanError, TelemetryClient, VITALS_SCRIPT};
pub use metrics::{parse_telemetry, MetricComputer, TelemetryError, SLOWEST_LIMIT};
pub use types::{
    BreakdownBucket, BrowserVersion, InitiatorType, Metrics, NavigationTiming, RawTelemetry,
    ResourceEntry, ScanResult, Vitals, VitalsRaw,
};

#[cfg(test)]
pub(crate) use metrics::tests::timing as sample_timing;

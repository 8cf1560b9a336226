use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Response of the DevTools `/json/version` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserVersion {
    #[serde(rename = "Browser", default)]
    pub browser: Option<String>,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

/// Navigation timing marks as exposed by `window.performance.timing`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub navigation_start: f64,
    pub redirect_start: f64,
    pub redirect_end: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub secure_connection_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    pub(crate) fn marks(&self) -> [(&'static str, f64); 12] {
        [
            ("navigationStart", self.navigation_start),
            ("redirectStart", self.redirect_start),
            ("redirectEnd", self.redirect_end),
            ("domainLookupStart", self.domain_lookup_start),
            ("domainLookupEnd", self.domain_lookup_end),
            ("connectStart", self.connect_start),
            ("connectEnd", self.connect_end),
            ("secureConnectionStart", self.secure_connection_start),
            ("requestStart", self.request_start),
            ("responseStart", self.response_start),
            ("domContentLoadedEventEnd", self.dom_content_loaded_event_end),
            ("loadEventEnd", self.load_event_end),
        ]
    }
}

/// Category of a loaded resource, from `PerformanceResourceTiming.initiatorType`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InitiatorType {
    Img,
    Script,
    Css,
    Font,
    Xhr,
    Fetch,
    Iframe,
    #[default]
    Other,
}

impl InitiatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiatorType::Img => "img",
            InitiatorType::Script => "script",
            InitiatorType::Css => "css",
            InitiatorType::Font => "font",
            InitiatorType::Xhr => "xhr",
            InitiatorType::Fetch => "fetch",
            InitiatorType::Iframe => "iframe",
            InitiatorType::Other => "other",
        }
    }
}

impl From<&str> for InitiatorType {
    fn from(s: &str) -> Self {
        match s {
            "img" => InitiatorType::Img,
            "script" => InitiatorType::Script,
            "css" => InitiatorType::Css,
            "font" => InitiatorType::Font,
            "xhr" => InitiatorType::Xhr,
            "fetch" => InitiatorType::Fetch,
            "iframe" => InitiatorType::Iframe,
            _ => InitiatorType::Other,
        }
    }
}

impl From<String> for InitiatorType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// Never fails: unknown names become `Other`
impl FromStr for InitiatorType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<InitiatorType> for String {
    fn from(t: InitiatorType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for InitiatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `PerformanceResourceTiming` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default)]
    pub initiator_type: InitiatorType,
    /// Bytes on the wire; the browser reports 0 for opaque cross-origin entries
    #[serde(default)]
    pub transfer_size: u64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub start_time: f64,
}

/// Output of `window.getVitals()` from the injected script
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VitalsRaw {
    #[serde(rename = "LCP", default)]
    pub lcp: f64,
    #[serde(rename = "FID", default)]
    pub fid: f64,
    #[serde(rename = "CLS", default)]
    pub cls: f64,
}

/// Everything the page reports for one navigation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTelemetry {
    pub navigation: NavigationTiming,
    pub resources: Vec<ResourceEntry>,
    pub vitals: VitalsRaw,
}

/// Derived navigation timings in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub dns: f64,
    pub tcp: f64,
    /// 0 when no TLS handshake was observed
    pub tls: f64,
    pub redirect: f64,
    pub ttfb: f64,
    pub dom_load: f64,
    pub full_load: f64,
}

impl Metrics {
    /// Names of timings that came out negative (clock skew, cached redirects).
    /// Such values are kept as-is rather than clamped.
    pub fn negative_timings(&self) -> Vec<&'static str> {
        [
            ("dns", self.dns),
            ("tcp", self.tcp),
            ("tls", self.tls),
            ("redirect", self.redirect),
            ("ttfb", self.ttfb),
            ("domLoad", self.dom_load),
            ("fullLoad", self.full_load),
        ]
        .into_iter()
        .filter(|(_, v)| *v < 0.0)
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    #[serde(rename = "LCP")]
    pub lcp: f64,
    #[serde(rename = "FID")]
    pub fid: f64,
    /// Rounded to 4 decimal places
    #[serde(rename = "CLS")]
    pub cls: f64,
}

/// Per-initiator aggregate
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BreakdownBucket {
    pub count: usize,
    pub size: u64,
    pub duration: f64,
}

/// The canonical record produced by one successful scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub url: String,
    pub scan_started_at: DateTime<Utc>,
    pub scan_ended_at: DateTime<Utc>,
    pub scan_duration_ms: i64,
    pub metrics: Metrics,
    pub vitals: Vitals,
    pub resources: Vec<ResourceEntry>,
    pub total_size: u64,
    pub total_requests: usize,
    pub breakdown: BTreeMap<InitiatorType, BreakdownBucket>,
    pub slowest: Vec<ResourceEntry>,
    #[serde(default)]
    pub screenshot_ref: Option<String>,
}

impl ScanResult {
    /// Resources of one initiator type, in load order
    pub fn resources_of(&self, initiator: InitiatorType) -> impl Iterator<Item = &ResourceEntry> {
        self.resources
            .iter()
            .filter(move |r| r.initiator_type == initiator)
    }

    /// `ttfb + fullLoad`, the headline speed score used when ranking pages
    pub fn speed_score(&self) -> f64 {
        self.metrics.ttfb + self.metrics.full_load
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_initiator_type_maps_to_other() {
        let entry: ResourceEntry = serde_json::from_str(
            r#"{"name":"https://a.test/x","initiatorType":"beacon","transferSize":10,"duration":1.5,"startTime":2}"#,
        )
        .unwrap();
        assert_eq!(entry.initiator_type, InitiatorType::Other);
        assert_eq!(entry.transfer_size, 10);
    }

    #[test]
    fn test_missing_resource_fields_default() {
        let entry: ResourceEntry = serde_json::from_str(r#"{"name":"https://a.test/y"}"#).unwrap();
        assert_eq!(entry.initiator_type, InitiatorType::Other);
        assert_eq!(entry.transfer_size, 0);
        assert_eq!(entry.duration, 0.0);
    }

    #[test]
    fn test_navigation_timing_requires_all_marks() {
        let result: Result<NavigationTiming, _> =
            serde_json::from_str(r#"{"navigationStart": 1, "requestStart": 2}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_initiator_type_parses() {
        assert_eq!("css".parse::<InitiatorType>(), Ok(InitiatorType::Css));
        assert_eq!("beacon".parse::<InitiatorType>(), Ok(InitiatorType::Other));
        assert_eq!(InitiatorType::from("iframe"), InitiatorType::Iframe);
        for kind in [InitiatorType::Img, InitiatorType::Fetch, InitiatorType::Other] {
            assert_eq!(kind.as_str().parse::<InitiatorType>(), Ok(kind));
        }
    }

    #[test]
    fn test_initiator_type_serializes_lowercase() {
        let json = serde_json::to_string(&InitiatorType::Img).unwrap();
        assert_eq!(json, "\"img\"");
    }

    #[test]
    fn test_negative_timings_reported() {
        let metrics = Metrics {
            redirect: -3.0,
            ttfb: 10.0,
            ..Default::default()
        };
        assert_eq!(metrics.negative_timings(), vec!["redirect"]);
    }
}

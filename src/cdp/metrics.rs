use super::types::{
    BreakdownBucket, InitiatorType, Metrics, NavigationTiming, RawTelemetry, ResourceEntry,
    ScanResult, Vitals, VitalsRaw,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Number of entries kept in `ScanResult::slowest`
pub const SLOWEST_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Malformed telemetry: {0}")]
    Malformed(String),
    #[error("Telemetry violates invariant: {0}")]
    Invariant(String),
}

/// Decode the three JSON documents returned by the page
pub fn parse_telemetry(
    navigation_json: &str,
    resources_json: &str,
    vitals_json: &str,
) -> Result<RawTelemetry, TelemetryError> {
    let navigation: NavigationTiming = serde_json::from_str(navigation_json)
        .map_err(|e| TelemetryError::Malformed(format!("navigation timing: {}", e)))?;
    let resources: Vec<ResourceEntry> = serde_json::from_str(resources_json)
        .map_err(|e| TelemetryError::Malformed(format!("resource timing: {}", e)))?;
    let vitals: VitalsRaw = serde_json::from_str(vitals_json)
        .map_err(|e| TelemetryError::Malformed(format!("vitals: {}", e)))?;

    Ok(RawTelemetry {
        navigation,
        resources,
        vitals,
    })
}

/// Turns raw browser telemetry into a `ScanResult`.
pub struct MetricComputer;

impl MetricComputer {
    pub fn compute(
        raw: RawTelemetry,
        url: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<ScanResult, TelemetryError> {
        if url.trim().is_empty() {
            return Err(TelemetryError::Invariant("url is empty".to_string()));
        }
        if ended_at < started_at {
            return Err(TelemetryError::Invariant(format!(
                "scan ended ({}) before it started ({})",
                ended_at, started_at
            )));
        }
        Self::validate(&raw)?;

        let metrics = Self::derive_metrics(&raw.navigation);
        let negative = metrics.negative_timings();
        if !negative.is_empty() {
            warn!("Negative derived timings for {}: {:?}", url, negative);
        }

        let vitals = Vitals {
            lcp: raw.vitals.lcp,
            fid: raw.vitals.fid,
            cls: round4(raw.vitals.cls),
        };

        let resources = raw.resources;
        let total_size = resources.iter().map(|r| r.transfer_size).sum();
        let total_requests = resources.len();
        let breakdown = Self::breakdown(&resources);
        let slowest = Self::slowest(&resources);

        Ok(ScanResult {
            url: url.to_string(),
            scan_started_at: started_at,
            scan_ended_at: ended_at,
            scan_duration_ms: (ended_at - started_at).num_milliseconds(),
            metrics,
            vitals,
            resources,
            total_size,
            total_requests,
            breakdown,
            slowest,
            screenshot_ref: None,
        })
    }

    fn validate(raw: &RawTelemetry) -> Result<(), TelemetryError> {
        for (name, value) in raw.navigation.marks() {
            if !value.is_finite() {
                return Err(TelemetryError::Invariant(format!(
                    "navigation mark {} is not finite",
                    name
                )));
            }
        }

        for entry in &raw.resources {
            if !entry.duration.is_finite() || entry.duration < 0.0 {
                return Err(TelemetryError::Invariant(format!(
                    "resource {} has invalid duration {}",
                    entry.name, entry.duration
                )));
            }
            if !entry.start_time.is_finite() || entry.start_time < 0.0 {
                return Err(TelemetryError::Invariant(format!(
                    "resource {} has invalid startTime {}",
                    entry.name, entry.start_time
                )));
            }
        }

        let vitals = &raw.vitals;
        for (name, value) in [("LCP", vitals.lcp), ("FID", vitals.fid), ("CLS", vitals.cls)] {
            if !value.is_finite() || value < 0.0 {
                return Err(TelemetryError::Invariant(format!(
                    "{} has invalid value {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    fn derive_metrics(t: &NavigationTiming) -> Metrics {
        let tls = if t.secure_connection_start > 0.0 {
            t.connect_end - t.secure_connection_start
        } else {
            0.0
        };

        Metrics {
            dns: t.domain_lookup_end - t.domain_lookup_start,
            tcp: t.connect_end - t.connect_start,
            tls,
            redirect: t.redirect_end - t.redirect_start,
            ttfb: t.response_start - t.request_start,
            dom_load: t.dom_content_loaded_event_end - t.navigation_start,
            full_load: t.load_event_end - t.navigation_start,
        }
    }

    fn breakdown(resources: &[ResourceEntry]) -> BTreeMap<InitiatorType, BreakdownBucket> {
        let mut buckets = BTreeMap::new();
        for r in resources {
            let bucket: &mut BreakdownBucket = buckets.entry(r.initiator_type).or_default();
            bucket.count += 1;
            bucket.size += r.transfer_size;
            bucket.duration += r.duration;
        }
        buckets
    }

    fn slowest(resources: &[ResourceEntry]) -> Vec<ResourceEntry> {
        let mut sorted: Vec<ResourceEntry> = resources.to_vec();
        // sort_by is stable, so equal durations keep load order
        sorted.sort_by(|a, b| b.duration.total_cmp(&a.duration));
        sorted.truncate(SLOWEST_LIMIT);
        sorted
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn timing() -> NavigationTiming {
        NavigationTiming {
            navigation_start: 1000.0,
            redirect_start: 0.0,
            redirect_end: 0.0,
            domain_lookup_start: 1010.0,
            domain_lookup_end: 1030.0,
            connect_start: 1030.0,
            connect_end: 1080.0,
            secure_connection_start: 1050.0,
            request_start: 1080.0,
            response_start: 1280.0,
            dom_content_loaded_event_end: 2200.0,
            load_event_end: 3100.0,
        }
    }

    fn resource(name: &str, initiator: InitiatorType, size: u64, duration: f64) -> ResourceEntry {
        ResourceEntry {
            name: name.to_string(),
            initiator_type: initiator,
            transfer_size: size,
            duration,
            start_time: 5.0,
        }
    }

    fn compute(raw: RawTelemetry) -> ScanResult {
        let start = Utc::now();
        MetricComputer::compute(raw, "https://example.test/", start, start + Duration::milliseconds(1500))
            .unwrap()
    }

    #[test]
    fn test_derived_metrics() {
        let result = compute(RawTelemetry {
            navigation: timing(),
            resources: vec![],
            vitals: VitalsRaw::default(),
        });

        assert_eq!(result.metrics.dns, 20.0);
        assert_eq!(result.metrics.tcp, 50.0);
        assert_eq!(result.metrics.tls, 30.0);
        assert_eq!(result.metrics.redirect, 0.0);
        assert_eq!(result.metrics.ttfb, 200.0);
        assert_eq!(result.metrics.dom_load, 1200.0);
        assert_eq!(result.metrics.full_load, 2100.0);
        assert_eq!(result.scan_duration_ms, 1500);
        assert!(result.screenshot_ref.is_none());
    }

    #[test]
    fn test_tls_zero_without_handshake() {
        let mut nav = timing();
        nav.secure_connection_start = 0.0;
        let result = compute(RawTelemetry {
            navigation: nav,
            resources: vec![],
            vitals: VitalsRaw::default(),
        });
        assert_eq!(result.metrics.tls, 0.0);
    }

    #[test]
    fn test_negative_timing_passes_through() {
        let mut nav = timing();
        nav.response_start = 1070.0;
        let result = compute(RawTelemetry {
            navigation: nav,
            resources: vec![],
            vitals: VitalsRaw::default(),
        });
        assert_eq!(result.metrics.ttfb, -10.0);
        assert_eq!(result.metrics.negative_timings(), vec!["ttfb"]);
    }

    #[test]
    fn test_totals_and_breakdown() {
        let resources = vec![
            resource("a.png", InitiatorType::Img, 1000, 10.0),
            resource("b.js", InitiatorType::Script, 2000, 20.0),
            resource("c.png", InitiatorType::Img, 3000, 30.0),
            resource("d", InitiatorType::Other, 4, 1.0),
        ];
        let result = compute(RawTelemetry {
            navigation: timing(),
            resources,
            vitals: VitalsRaw::default(),
        });

        assert_eq!(result.total_size, 6004);
        assert_eq!(result.total_requests, 4);

        let img = &result.breakdown[&InitiatorType::Img];
        assert_eq!(img.count, 2);
        assert_eq!(img.size, 4000);
        assert_eq!(img.duration, 40.0);

        let count: usize = result.breakdown.values().map(|b| b.count).sum();
        let size: u64 = result.breakdown.values().map(|b| b.size).sum();
        assert_eq!(count, result.total_requests);
        assert_eq!(size, result.total_size);
    }

    #[test]
    fn test_slowest_is_stable_and_capped() {
        let mut resources = Vec::new();
        for i in 0..15 {
            // pairs of equal durations to exercise tie ordering
            resources.push(resource(&format!("r{}", i), InitiatorType::Script, 1, (i / 2) as f64));
        }
        let result = compute(RawTelemetry {
            navigation: timing(),
            resources: resources.clone(),
            vitals: VitalsRaw::default(),
        });

        assert_eq!(result.slowest.len(), SLOWEST_LIMIT);
        let names: Vec<&str> = result.slowest.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names[..4], ["r14", "r12", "r13", "r10"]);
        for pair in result.slowest.windows(2) {
            assert!(pair[0].duration >= pair[1].duration);
        }
        // resources keep their original order
        assert_eq!(result.resources, resources);
    }

    #[test]
    fn test_slowest_with_few_resources() {
        let result = compute(RawTelemetry {
            navigation: timing(),
            resources: vec![
                resource("a", InitiatorType::Css, 1, 5.0),
                resource("b", InitiatorType::Css, 1, 9.0),
            ],
            vitals: VitalsRaw::default(),
        });
        assert_eq!(result.slowest.len(), 2);
        assert_eq!(result.slowest[0].name, "b");
    }

    #[test]
    fn test_cls_rounded() {
        let result = compute(RawTelemetry {
            navigation: timing(),
            resources: vec![],
            vitals: VitalsRaw {
                lcp: 1200.0,
                fid: 8.0,
                cls: 0.123456,
            },
        });
        assert_eq!(result.vitals.cls, 0.1235);
        assert_eq!(result.vitals.lcp, 1200.0);
    }

    #[test]
    fn test_rejects_negative_vitals() {
        let start = Utc::now();
        let err = MetricComputer::compute(
            RawTelemetry {
                navigation: timing(),
                resources: vec![],
                vitals: VitalsRaw {
                    lcp: -1.0,
                    fid: 0.0,
                    cls: 0.0,
                },
            },
            "https://example.test/",
            start,
            start,
        )
        .unwrap_err();
        assert!(matches!(err, TelemetryError::Invariant(_)));
    }

    #[test]
    fn test_rejects_reversed_scan_window() {
        let start = Utc::now();
        let result = MetricComputer::compute(
            RawTelemetry {
                navigation: timing(),
                resources: vec![],
                vitals: VitalsRaw::default(),
            },
            "https://example.test/",
            start,
            start - Duration::seconds(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_telemetry_missing_mark_is_malformed() {
        let err = parse_telemetry(r#"{"navigationStart": 1}"#, "[]", "{}").unwrap_err();
        assert!(matches!(err, TelemetryError::Malformed(_)));
    }

    #[test]
    fn test_parse_telemetry() {
        let nav = serde_json::to_string(&timing()).unwrap();
        let raw = parse_telemetry(
            &nav,
            r#"[{"name":"https://x.test/a.js","initiatorType":"script","transferSize":512,"duration":40.5,"startTime":12.1}]"#,
            r#"{"LCP":1800.2,"FID":0,"CLS":0.02}"#,
        )
        .unwrap();
        assert_eq!(raw.resources.len(), 1);
        assert_eq!(raw.resources[0].initiator_type, InitiatorType::Script);
        assert_eq!(raw.vitals.lcp, 1800.2);
    }
}

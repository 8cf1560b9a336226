#![allow(dead_code)]

use chrono::{Duration, Utc};
use webspeed_lib::cdp::{
    InitiatorType, MetricComputer, NavigationTiming, RawTelemetry, ResourceEntry, ScanResult,
    VitalsRaw,
};

/// Navigation marks giving ttfb, domLoad and fullLoad as requested (ms)
pub fn timing(ttfb: f64, dom_load: f64, full_load: f64) -> NavigationTiming {
    let start = 1_000.0;
    NavigationTiming {
        navigation_start: start,
        redirect_start: 0.0,
        redirect_end: 0.0,
        domain_lookup_start: start + 5.0,
        domain_lookup_end: start + 25.0,
        connect_start: start + 25.0,
        connect_end: start + 75.0,
        secure_connection_start: 0.0,
        request_start: start + 80.0,
        response_start: start + 80.0 + ttfb,
        dom_content_loaded_event_end: start + dom_load,
        load_event_end: start + full_load,
    }
}

pub fn resource(name: &str, initiator_type: InitiatorType, transfer_size: u64, duration: f64) -> ResourceEntry {
    ResourceEntry {
        name: name.to_string(),
        initiator_type,
        transfer_size,
        duration,
        start_time: 0.0,
    }
}

pub fn scan_result(url: &str, raw: RawTelemetry) -> ScanResult {
    let ended = Utc::now();
    MetricComputer::compute(raw, url, ended - Duration::milliseconds(2500), ended).unwrap()
}

/// A quick page with no resources and zeroed vitals
pub fn quick_result(url: &str, ttfb: f64, full_load: f64) -> ScanResult {
    scan_result(
        url,
        RawTelemetry {
            navigation: timing(ttfb, full_load.min(1000.0), full_load),
            resources: vec![],
            vitals: VitalsRaw::default(),
        },
    )
}

mod common;

use common::{resource, scan_result, timing};
use webspeed_lib::analysis::rules::*;
use webspeed_lib::analysis::{analyze, Analyzer};
use webspeed_lib::cdp::{InitiatorType, RawTelemetry, VitalsRaw};
use webspeed_lib::config::Thresholds;

fn heavy_page() -> RawTelemetry {
    let mut resources: Vec<_> = (0..149)
        .map(|i| resource(&format!("https://shop.test/api/{}", i), InitiatorType::Xhr, 1_000, 20.0))
        .collect();
    resources.push(resource(
        "https://shop.test/hero.jpg",
        InitiatorType::Img,
        300 * 1024,
        90.0,
    ));

    RawTelemetry {
        navigation: timing(700.0, 1_800.0, 2_900.0),
        resources,
        vitals: VitalsRaw {
            lcp: 2_600.0,
            fid: 40.0,
            cls: 0.2,
        },
    }
}

#[test]
fn heavy_page_findings_in_rule_order() {
    let result = scan_result("https://shop.test/", heavy_page());
    assert_eq!(result.total_requests, 150);

    let findings = analyze(&result);
    assert_eq!(
        findings.issues,
        vec![
            "Slow server response: TTFB 700ms (> 600ms)".to_string(),
            "High LCP (2600ms)".to_string(),
            "High CLS (0.2)".to_string(),
            "Too many requests: 150 (> 120)".to_string(),
            "1 large image(s) (> 250KB)".to_string(),
        ]
    );
    assert_eq!(
        findings.suggestions,
        vec![
            SUGGEST_SLOW_SERVER,
            SUGGEST_SLOW_LCP,
            SUGGEST_LAYOUT_SHIFT,
            SUGGEST_TOO_MANY_REQUESTS,
            SUGGEST_LARGE_IMAGES,
        ]
    );
}

#[test]
fn findings_are_deterministic() {
    let result = scan_result("https://shop.test/", heavy_page());
    assert_eq!(analyze(&result), analyze(&result));
}

#[test]
fn clean_page_has_no_findings() {
    let raw = RawTelemetry {
        navigation: timing(150.0, 900.0, 1_400.0),
        resources: vec![
            resource("https://ok.test/app.js", InitiatorType::Script, 40_000, 80.0),
            resource("https://ok.test/site.css", InitiatorType::Css, 8_000, 30.0),
            resource("https://ok.test/inter.woff2", InitiatorType::Font, 20_000, 60.0),
        ],
        vitals: VitalsRaw {
            lcp: 1_100.0,
            fid: 12.0,
            cls: 0.01,
        },
    };
    let findings = analyze(&scan_result("https://ok.test/", raw));
    assert!(findings.is_empty(), "unexpected findings: {:?}", findings.issues);
}

#[test]
fn slow_assets_fire_resource_rules() {
    let raw = RawTelemetry {
        navigation: timing(150.0, 900.0, 1_400.0),
        resources: vec![
            resource("https://slow.test/vendor.js", InitiatorType::Script, 90_000, 450.0),
            resource("https://slow.test/theme.css", InitiatorType::Css, 10_000, 250.0),
            resource("https://slow.test/brand.woff2", InitiatorType::Font, 30_000, 200.0),
        ],
        vitals: VitalsRaw::default(),
    };
    let findings = analyze(&scan_result("https://slow.test/", raw));
    assert_eq!(
        findings.issues,
        vec![
            "1 slow script(s) (> 300ms)".to_string(),
            "2 render-blocking resource(s)".to_string(),
            "Fonts load slowly".to_string(),
        ]
    );
}

#[test]
fn custom_thresholds_change_what_fires() {
    let result = scan_result("https://shop.test/", heavy_page());
    let analyzer = Analyzer::new(Thresholds {
        ttfb_ms: 1_000.0,
        max_requests: 200,
        ..Thresholds::default()
    });
    let findings = analyzer.analyze(&result);
    assert_eq!(findings.len(), 3);
    assert!(findings.iter().all(|f| !f.issue.starts_with("Slow server")));
}

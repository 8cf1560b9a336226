//! The fixed, ordered rule table evaluated by the analyzer.
//!
//! Each rule inspects a `ScanResult` against the configured `Thresholds` and
//! returns the issue text when it fires. Rules are independent; their table
//! position is their output position.

use crate::cdp::{InitiatorType, ScanResult};
use crate::config::Thresholds;

const MIB: f64 = 1024.0 * 1024.0;

pub const SUGGEST_SLOW_SERVER: &str = "Check the hosting/server or optimize backend processing.";
pub const SUGGEST_SLOW_DOM: &str = "The page runs heavy JavaScript or builds a complex DOM.";
pub const SUGGEST_SLOW_LOAD: &str = "Review images, JavaScript, fonts and redundant requests.";
pub const SUGGEST_SLOW_LCP: &str =
    "The main hero content renders late: the hero image is too large or rendering is blocked.";
pub const SUGGEST_LAYOUT_SHIFT: &str =
    "Layout jumps; give images, banners and videos fixed dimensions.";
pub const SUGGEST_SLOW_INPUT: &str = "JavaScript blocks the main thread or event handlers are heavy.";
pub const SUGGEST_TOO_MANY_REQUESTS: &str =
    "Bundle JS/CSS files, minify them and remove unnecessary resources.";
pub const SUGGEST_PAGE_WEIGHT: &str = "Compress images, enable gzip/brotli and shrink JS bundles.";
pub const SUGGEST_LARGE_IMAGES: &str = "Use WebP/AVIF and lower image quality.";
pub const SUGGEST_SLOW_SCRIPTS: &str = "Split code, lazy load and drop unused JavaScript.";
pub const SUGGEST_RENDER_BLOCKING: &str =
    "Use media=print for non-critical CSS, async/defer for scripts and optimize the critical path.";
pub const SUGGEST_SLOW_FONTS: &str = "Use font-display: swap, preload fonts and compress to woff2.";

/// One analyzer rule
pub struct Rule {
    pub name: &'static str,
    pub check: fn(&ScanResult, &Thresholds) -> Option<String>,
    pub suggestion: &'static str,
}

impl Rule {
    pub fn evaluate(&self, result: &ScanResult, thresholds: &Thresholds) -> Option<(String, &'static str)> {
        (self.check)(result, thresholds).map(|issue| (issue, self.suggestion))
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "slow-server-response",
        check: slow_server_response,
        suggestion: SUGGEST_SLOW_SERVER,
    },
    Rule {
        name: "slow-dom",
        check: slow_dom,
        suggestion: SUGGEST_SLOW_DOM,
    },
    Rule {
        name: "slow-full-load",
        check: slow_full_load,
        suggestion: SUGGEST_SLOW_LOAD,
    },
    Rule {
        name: "slow-lcp",
        check: slow_lcp,
        suggestion: SUGGEST_SLOW_LCP,
    },
    Rule {
        name: "layout-instability",
        check: layout_instability,
        suggestion: SUGGEST_LAYOUT_SHIFT,
    },
    Rule {
        name: "slow-input",
        check: slow_input,
        suggestion: SUGGEST_SLOW_INPUT,
    },
    Rule {
        name: "too-many-requests",
        check: too_many_requests,
        suggestion: SUGGEST_TOO_MANY_REQUESTS,
    },
    Rule {
        name: "page-weight",
        check: page_weight,
        suggestion: SUGGEST_PAGE_WEIGHT,
    },
    Rule {
        name: "large-images",
        check: large_images,
        suggestion: SUGGEST_LARGE_IMAGES,
    },
    Rule {
        name: "slow-scripts",
        check: slow_scripts,
        suggestion: SUGGEST_SLOW_SCRIPTS,
    },
    Rule {
        name: "render-blocking",
        check: render_blocking,
        suggestion: SUGGEST_RENDER_BLOCKING,
    },
    Rule {
        name: "slow-fonts",
        check: slow_fonts,
        suggestion: SUGGEST_SLOW_FONTS,
    },
];

fn slow_server_response(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.metrics.ttfb > t.ttfb_ms)
        .then(|| format!("Slow server response: TTFB {:.0}ms (> {:.0}ms)", r.metrics.ttfb, t.ttfb_ms))
}

fn slow_dom(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.metrics.dom_load > t.dom_load_ms).then(|| {
        format!(
            "DOM load takes too long: {:.0}ms (> {:.0}ms)",
            r.metrics.dom_load, t.dom_load_ms
        )
    })
}

fn slow_full_load(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.metrics.full_load > t.full_load_ms).then(|| {
        format!(
            "Page loads slowly: {:.0}ms (> {:.0}ms)",
            r.metrics.full_load, t.full_load_ms
        )
    })
}

fn slow_lcp(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.vitals.lcp > t.lcp_ms).then(|| format!("High LCP ({:.0}ms)", r.vitals.lcp))
}

fn layout_instability(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.vitals.cls > t.cls).then(|| format!("High CLS ({})", r.vitals.cls))
}

fn slow_input(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.vitals.fid > t.fid_ms).then(|| format!("High FID ({:.0}ms)", r.vitals.fid))
}

fn too_many_requests(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.total_requests > t.max_requests)
        .then(|| format!("Too many requests: {} (> {})", r.total_requests, t.max_requests))
}

fn page_weight(r: &ScanResult, t: &Thresholds) -> Option<String> {
    (r.total_size > t.max_total_bytes)
        .then(|| format!("Page is too heavy ({:.1}MB)", r.total_size as f64 / MIB))
}

fn large_images(r: &ScanResult, t: &Thresholds) -> Option<String> {
    let count = r
        .resources_of(InitiatorType::Img)
        .filter(|res| res.transfer_size > t.large_image_bytes)
        .count();
    (count > 0).then(|| {
        format!(
            "{} large image(s) (> {}KB)",
            count,
            t.large_image_bytes / 1024
        )
    })
}

fn slow_scripts(r: &ScanResult, t: &Thresholds) -> Option<String> {
    let count = r
        .resources_of(InitiatorType::Script)
        .filter(|res| res.duration > t.slow_script_ms)
        .count();
    (count > 0).then(|| format!("{} slow script(s) (> {:.0}ms)", count, t.slow_script_ms))
}

fn render_blocking(r: &ScanResult, t: &Thresholds) -> Option<String> {
    let count = r
        .resources
        .iter()
        .filter(|res| matches!(res.initiator_type, InitiatorType::Css | InitiatorType::Script))
        .filter(|res| res.duration > t.render_blocking_ms)
        .count();
    (count > 0).then(|| format!("{} render-blocking resource(s)", count))
}

fn slow_fonts(r: &ScanResult, t: &Thresholds) -> Option<String> {
    r.resources_of(InitiatorType::Font)
        .any(|res| res.duration > t.slow_font_ms)
        .then(|| "Fonts load slowly".to_string())
}

use crate::cdp::ScanResult;
use serde::{Deserialize, Serialize};

/// One metric compared across two scans. All tracked metrics are
/// lower-is-better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    /// `None` when `before` is 0
    pub percent: Option<f64>,
    pub improved: bool,
}

impl ComparisonRow {
    fn new(name: &str, before: f64, after: f64) -> Self {
        let delta = after - before;
        let percent = (before != 0.0).then(|| delta * 100.0 / before);
        Self {
            name: name.to_string(),
            before,
            after,
            delta,
            percent,
            improved: delta < 0.0,
        }
    }
}

/// Headline verdict on `ttfb + fullLoad`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    BeforeFaster,
    AfterFaster,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
    pub verdict: Verdict,
}

impl Comparison {
    pub fn row(&self, name: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.name == name)
    }
}

pub fn compare(before: &ScanResult, after: &ScanResult) -> Comparison {
    let (b, a) = (&before.metrics, &after.metrics);
    let rows = vec![
        ComparisonRow::new("DNS", b.dns, a.dns),
        ComparisonRow::new("TCP", b.tcp, a.tcp),
        ComparisonRow::new("TTFB", b.ttfb, a.ttfb),
        ComparisonRow::new("DOM load", b.dom_load, a.dom_load),
        ComparisonRow::new("Full load", b.full_load, a.full_load),
        ComparisonRow::new("LCP", before.vitals.lcp, after.vitals.lcp),
        ComparisonRow::new("FID", before.vitals.fid, after.vitals.fid),
        ComparisonRow::new("CLS", before.vitals.cls, after.vitals.cls),
        ComparisonRow::new(
            "Total requests",
            before.total_requests as f64,
            after.total_requests as f64,
        ),
        ComparisonRow::new("Total size", before.total_size as f64, after.total_size as f64),
    ];

    let (before_score, after_score) = (before.speed_score(), after.speed_score());
    let verdict = if before_score < after_score {
        Verdict::BeforeFaster
    } else if after_score < before_score {
        Verdict::AfterFaster
    } else {
        Verdict::Tie
    };

    Comparison { rows, verdict }
}

/// 0–100 per-metric scores, 100 being best, for radar-style displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub ttfb: f64,
    pub dom_load: f64,
    pub full_load: f64,
    pub lcp: f64,
    pub cls: f64,
}

const TIMING_BUDGET_MS: f64 = 3000.0;
const LCP_BUDGET_MS: f64 = 2500.0;
const CLS_BUDGET: f64 = 0.1;

impl ScoreCard {
    pub fn from_result(result: &ScanResult) -> Self {
        let score = |value: f64, budget: f64| (budget - value).max(0.0) * 100.0 / budget;
        Self {
            ttfb: score(result.metrics.ttfb, TIMING_BUDGET_MS),
            dom_load: score(result.metrics.dom_load, TIMING_BUDGET_MS),
            full_load: score(result.metrics.full_load, TIMING_BUDGET_MS),
            lcp: score(result.vitals.lcp, LCP_BUDGET_MS),
            cls: score(result.vitals.cls, CLS_BUDGET),
        }
    }
}

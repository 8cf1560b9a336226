//! Rule-based performance analysis.
//!
//! `Analyzer` walks the ordered rule table in [`rules::RULES`] and collects an
//! issue plus a suggestion for every rule that fires. Evaluation is pure: the
//! same `ScanResult` always produces the same `Findings`, in table order.

pub mod rules;
mod types;

pub use rules::{Rule, RULES};
pub use types::{Finding, Findings};

use crate::cdp::ScanResult;
use crate::config::Thresholds;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    thresholds: Thresholds,
}

impl Analyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn analyze(&self, result: &ScanResult) -> Findings {
        let mut findings = Findings::default();
        for rule in RULES {
            if let Some((issue, suggestion)) = rule.evaluate(result, &self.thresholds) {
                debug!("Rule {} fired for {}", rule.name, result.url);
                findings.push(issue, suggestion);
            }
        }
        findings
    }
}

/// Analyze with the default thresholds
pub fn analyze(result: &ScanResult) -> Findings {
    Analyzer::default().analyze(result)
}

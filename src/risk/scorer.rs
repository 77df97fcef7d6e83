//! Weighted risk scoring: behavior sample in, normalized 0-100 score out.
//! Pure and deterministic; identical input always yields identical output.

use super::factors::{BehaviorFactor, BehaviorSample, FactorTable};
use serde::{Deserialize, Serialize};

/// One factor's share of an assessment. `severity` is the raw
/// value/threshold ratio (may exceed 1); `contribution` is capped at the
/// factor's weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDetail {
    #[serde(rename = "type")]
    pub kind: BehaviorFactor,
    pub severity: f64,
    pub contribution: f64,
}

/// Scoring output for a single behavior sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub details: Vec<RiskDetail>,
}

pub struct RiskScorer {
    factors: FactorTable,
}

impl RiskScorer {
    pub fn new(factors: FactorTable) -> Self {
        Self { factors }
    }

    /// Score a sample against the configured factor table.
    ///
    /// Per factor: `severity = value / threshold`,
    /// `contribution = weight * min(severity, 1)`. The clamp keeps a single
    /// extreme metric from exceeding its own weight's ceiling. The total is
    /// normalized to an integer score in [0, 100].
    pub fn calculate(&self, sample: &BehaviorSample) -> RiskAssessment {
        let mut total = 0.0;
        let mut details = Vec::new();

        for (factor, value) in sample.iter() {
            let cfg = self.factors.get(factor);
            let severity = value / cfg.threshold;
            let contribution = cfg.weight * severity.min(1.0);
            total += contribution;
            details.push(RiskDetail {
                kind: factor,
                severity,
                contribution,
            });
        }

        let score = (total * 100.0).min(100.0).round() as u8;
        debug_assert!(score <= 100, "risk score out of range: {}", score);
        RiskAssessment { score, details }
    }

    pub fn factors(&self) -> &FactorTable {
        &self.factors
    }

    pub fn factors_mut(&mut self) -> &mut FactorTable {
        &mut self.factors
    }
}

//! Adaptive factor weights: an offline blend of historical violation
//! frequency and severity into the live factor table. Never runs in the
//! scoring hot path.

use super::factors::{BehaviorFactor, FactorTable};
use crate::error::Result;
use crate::store::SessionStore;
use std::collections::HashMap;
use tracing::{debug, info};

pub struct WeightUpdater {
    /// Most recent violations considered per refresh
    pub fetch_limit: usize,
    /// Share of the computed weight blended into the current one
    pub blend: f64,
}

impl Default for WeightUpdater {
    fn default() -> Self {
        Self {
            fetch_limit: 1000,
            blend: 0.2,
        }
    }
}

impl WeightUpdater {
    /// Recompute factor weights from historical violations and blend them
    /// into `factors` as `new = (1 - blend) * old + blend * computed`.
    /// No-op when no usable history exists.
    pub async fn refresh<S: SessionStore>(
        &self,
        store: &S,
        factors: &mut FactorTable,
    ) -> Result<()> {
        let violations = store.recent_violation_details(self.fetch_limit).await?;
        if violations.is_empty() {
            debug!("no violation history; weights unchanged");
            return Ok(());
        }

        let computed = compute_weights(&violations);
        for factor in BehaviorFactor::ALL {
            let new_weight = computed.get(&factor).copied().unwrap_or(0.0);
            let cfg = factors.get_mut(factor);
            cfg.weight = (1.0 - self.blend) * cfg.weight + self.blend * new_weight;
        }
        info!(
            violations = violations.len(),
            "factor weights refreshed from history"
        );
        Ok(())
    }
}

/// Per-factor weight candidates: the average of normalized frequency and
/// normalized cumulative severity across the violation set.
fn compute_weights(violations: &[Vec<super::scorer::RiskDetail>]) -> HashMap<BehaviorFactor, f64> {
    let mut frequency: HashMap<BehaviorFactor, f64> = HashMap::new();
    let mut severity: HashMap<BehaviorFactor, f64> = HashMap::new();

    for details in violations {
        for detail in details {
            *frequency.entry(detail.kind).or_default() += 1.0;
            *severity.entry(detail.kind).or_default() += detail.severity;
        }
    }

    let total = violations.len() as f64;
    BehaviorFactor::ALL
        .iter()
        .map(|&factor| {
            let freq = frequency.get(&factor).copied().unwrap_or(0.0);
            let sev = severity.get(&factor).copied().unwrap_or(0.0);
            (factor, (freq / total + sev / total) / 2.0)
        })
        .collect()
}

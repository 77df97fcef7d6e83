//! Per-session accumulators used by the intervention policy. One context
//! and one history exist per exam session; nothing here is shared across
//! sessions.

use crate::risk::policy::{InterventionResponse, InterventionType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A past violation's timestamp and score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ViolationEntry {
    pub ts_ms: i64,
    pub score: u8,
}

/// Violation and warning history for one exam session.
///
/// `violations` only grows; entries older than the policy's lookback window
/// are filtered at query time, never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    violations: Vec<ViolationEntry>,
    pub warning_count: u32,
    risk_trend: Vec<u8>,
    last_assessment_ms: Option<i64>,
    last_warning_ms: Option<i64>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_violation(&mut self, ts_ms: i64, score: u8) {
        self.violations.push(ViolationEntry { ts_ms, score });
    }

    /// Violations inside the trailing lookback window.
    pub fn recent_violation_count(&self, now_ms: i64, lookback_ms: i64) -> usize {
        self.violations
            .iter()
            .filter(|v| now_ms - v.ts_ms < lookback_ms)
            .count()
    }

    pub fn violations(&self) -> &[ViolationEntry] {
        &self.violations
    }

    pub fn push_score(&mut self, score: u8, now_ms: i64) {
        self.risk_trend.push(score);
        self.last_assessment_ms = Some(now_ms);
    }

    pub fn risk_trend(&self) -> &[u8] {
        &self.risk_trend
    }

    pub fn last_assessment_ms(&self) -> Option<i64> {
        self.last_assessment_ms
    }

    /// Warning debounce: returns false (and leaves state untouched) when the
    /// previous warning was issued less than `min_interval_ms` ago; otherwise
    /// stamps the new warning time and returns true.
    pub fn try_begin_warning(&mut self, now_ms: i64, min_interval_ms: i64) -> bool {
        if let Some(last) = self.last_warning_ms {
            if now_ms - last < min_interval_ms {
                return false;
            }
        }
        self.last_warning_ms = Some(now_ms);
        true
    }
}

/// Bounded FIFO of the most recent intervention responses for one session,
/// used only to detect repeated-warning escalation.
#[derive(Debug, Clone)]
pub struct InterventionHistory {
    entries: VecDeque<InterventionResponse>,
    limit: usize,
}

impl InterventionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn push(&mut self, response: InterventionResponse) {
        self.entries.push_back(response);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Warning-type responses inside the trailing lookback window. Escalated
    /// rounds still carry the Warning type, so they keep counting here.
    pub fn recent_warning_count(&self, now_ms: i64, lookback_ms: i64) -> usize {
        self.entries
            .iter()
            .filter(|r| r.kind == InterventionType::Warning && now_ms - r.ts_ms < lookback_ms)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterventionResponse> {
        self.entries.iter()
    }
}

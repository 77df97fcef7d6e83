//! Intervention policy: maps a risk score plus recent session history to a
//! decision and the concrete actions carrying it out.
//!
//! Three separate threshold tables are in play and stay separate:
//! the intervention thresholds ([`PolicyConfig`]), the display-only
//! [`RiskLevel`] scale, and the cumulative-warning [`WarningLevel`] scale.

use crate::config::PolicyConfig;
use crate::session::context::{InterventionHistory, SessionContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterventionType {
    None,
    Monitor,
    Warning,
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Urgency {
    None,
    Low,
    Medium,
    High,
}

/// Recommendation derived from a score and the recent violation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionDecision {
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub reason: String,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    EndExam,
    IssueWarning,
    FinalWarning,
    NotifyAdmin,
    IncreaseMonitoring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub message: String,
}

/// A decision plus the actions chosen for it, as recorded in the
/// per-session intervention history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionResponse {
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub reason: String,
    pub urgency: Urgency,
    pub actions: Vec<Action>,
    pub ts_ms: i64,
}

/// Display-only risk level used for session coloring in review surfaces.
/// Its 50/25 cutoffs are independent of the intervention thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 50 {
            RiskLevel::High
        } else if score >= 25 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Coarse session-level scale driven by the cumulative warning count across
/// the whole exam, not the trailing window. High forces termination, Medium
/// forces enhanced monitoring, Low relaxes restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningLevel {
    Low,
    Medium,
    High,
}

impl WarningLevel {
    pub fn from_count(count: u32, config: &PolicyConfig) -> Self {
        if count >= config.high_warning_count {
            WarningLevel::High
        } else if count >= config.medium_warning_count {
            WarningLevel::Medium
        } else {
            WarningLevel::Low
        }
    }
}

pub struct InterventionPolicy {
    config: PolicyConfig,
}

impl InterventionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Recommend an intervention for a score, given the session's violation
    /// history. Violations older than the lookback window are ignored.
    pub fn recommend(
        &self,
        score: u8,
        context: &SessionContext,
        now_ms: i64,
    ) -> InterventionDecision {
        let recent = context.recent_violation_count(now_ms, self.config.lookback_ms);

        if score >= self.config.terminate_score {
            InterventionDecision {
                kind: InterventionType::Terminate,
                reason: "Critical risk level detected".to_string(),
                urgency: Urgency::High,
            }
        } else if score >= self.config.warning_score || recent >= self.config.recent_violation_limit
        {
            InterventionDecision {
                kind: InterventionType::Warning,
                reason: "Multiple suspicious activities detected".to_string(),
                urgency: Urgency::Medium,
            }
        } else if score >= self.config.monitor_score {
            InterventionDecision {
                kind: InterventionType::Monitor,
                reason: "Elevated risk behavior detected".to_string(),
                urgency: Urgency::Low,
            }
        } else {
            InterventionDecision {
                kind: InterventionType::None,
                reason: "Normal behavior".to_string(),
                urgency: Urgency::None,
            }
        }
    }

    /// Expand a decision into concrete actions. A warning escalates to a
    /// final warning plus an admin notification once the session has
    /// accumulated enough warning responses inside the trailing window.
    pub fn determine_response(
        &self,
        decision: InterventionDecision,
        history: &InterventionHistory,
        now_ms: i64,
    ) -> InterventionResponse {
        let mut actions = Vec::new();

        match decision.kind {
            InterventionType::Terminate => {
                actions.push(Action {
                    kind: ActionType::EndExam,
                    message: "Exam terminated due to critical violations".to_string(),
                });
            }
            InterventionType::Warning => {
                let recent_warnings =
                    history.recent_warning_count(now_ms, self.config.lookback_ms);
                if recent_warnings >= self.config.escalation_warning_limit {
                    actions.push(Action {
                        kind: ActionType::FinalWarning,
                        message: "Final warning: Continued violations will result in exam termination"
                            .to_string(),
                    });
                    actions.push(Action {
                        kind: ActionType::NotifyAdmin,
                        message: "Multiple warnings issued to candidate".to_string(),
                    });
                } else {
                    actions.push(Action {
                        kind: ActionType::IssueWarning,
                        message: "Warning: Suspicious activity detected".to_string(),
                    });
                }
            }
            InterventionType::Monitor => {
                actions.push(Action {
                    kind: ActionType::IncreaseMonitoring,
                    message: "Increased monitoring activated".to_string(),
                });
            }
            InterventionType::None => {}
        }

        InterventionResponse {
            kind: decision.kind,
            reason: decision.reason,
            urgency: decision.urgency,
            actions,
            ts_ms: now_ms,
        }
    }
}

//! Exam session lifecycle: shared state types, per-session context, and the
//! state machine driving assessments, interventions, and submission.

pub mod context;
mod machine;

pub use context::{InterventionHistory, SessionContext, ViolationEntry};
pub use machine::{Answer, ExamSession, SubmitOutcome};

use serde::{Deserialize, Serialize};

/// Exam session lifecycle. `Completed` and `Terminated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
    Terminated,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Terminated)
    }
}

/// Gates client-side restrictions (fullscreen enforcement and the like).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitoringLevel {
    Standard,
    Enhanced,
}

impl MonitoringLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringLevel::Standard => "STANDARD",
            MonitoringLevel::Enhanced => "ENHANCED",
        }
    }
}

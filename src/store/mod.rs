//! Persistence collaborator for sessions, violations, behavior logs,
//! warnings, notifications, and detection results.
//!
//! The engine talks to storage through [`SessionStore`]; the bundled
//! implementation is the encrypted SQLite store. Callers decide which
//! writes are fatal: mid-exam telemetry writes are best-effort, the final
//! completion/termination update is not.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::risk::scorer::RiskDetail;
use crate::session::MonitoringLevel;
use serde::{Deserialize, Serialize};

/// Session row as created at exam start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub exam_id: String,
    pub risk_score: u8,
    pub warnings: u32,
    pub duration_secs: u32,
    pub completed: bool,
    pub terminated: bool,
    pub monitoring_level: MonitoringLevel,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub session_id: String,
    pub user_id: String,
    pub reason: String,
    pub risk_score: u8,
    /// Factor breakdown or termination metadata, stored encrypted
    pub details: serde_json::Value,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorLogRecord {
    pub session_id: String,
    pub behavior_type: String,
    /// Severity payload, stored encrypted
    pub behavior_data: serde_json::Value,
    /// 0-1 share of the assessment this factor accounted for
    pub risk_contribution: f64,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRecord {
    pub session_id: String,
    pub user_id: String,
    pub message: String,
    pub trigger: Option<String>,
    pub status: String,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub session_id: String,
    pub user_id: String,
    pub message: String,
    pub status: String,
    pub ts_ms: i64,
}

/// Per-answer AI-detection outcome. Only a content hash is persisted,
/// never the submitted answer itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub session_id: String,
    pub question_id: String,
    pub content_sha256: String,
    pub confidence_score: u8,
    pub is_ai_generated: bool,
    pub explanation: String,
    pub errored: bool,
    pub ts_ms: i64,
}

/// Storage operations the session machine and weight updater depend on.
///
/// `increment_warnings` must be atomic at the store (read-modify-write at
/// the caller is a lost-update hazard under overlapping assessments).
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    async fn insert_session(&self, record: &SessionRecord) -> Result<()>;

    /// Final status write at completion or termination. `duration_secs`
    /// is recorded only when the exam ran to submission.
    async fn finish_session(
        &self,
        session_id: &str,
        terminated: bool,
        risk_score: u8,
        duration_secs: Option<u32>,
        now_ms: i64,
    ) -> Result<()>;

    async fn set_risk_score(&self, session_id: &str, score: u8, now_ms: i64) -> Result<()>;

    /// Atomically bump the session's warning counter; returns the new count.
    async fn increment_warnings(&self, session_id: &str, now_ms: i64) -> Result<u32>;

    async fn set_monitoring_level(
        &self,
        session_id: &str,
        level: MonitoringLevel,
        now_ms: i64,
    ) -> Result<()>;

    async fn insert_violation(&self, violation: &ViolationRecord) -> Result<()>;

    async fn insert_behavior_logs(&self, logs: &[BehaviorLogRecord]) -> Result<()>;

    async fn insert_warning(&self, warning: &WarningRecord) -> Result<()>;

    async fn insert_notification(&self, notification: &NotificationRecord) -> Result<()>;

    async fn insert_detection_results(&self, results: &[DetectionRecord]) -> Result<()>;

    /// Highest violation score recorded for the session (0 when none).
    async fn max_violation_score(&self, session_id: &str) -> Result<u8>;

    /// Sum of behavior-log risk contributions for the session.
    async fn behavior_risk_sum(&self, session_id: &str) -> Result<f64>;

    /// Factor breakdowns of the most recent violations across all sessions,
    /// newest first, for the offline weight updater. Records whose details
    /// are not factor breakdowns (terminations, detection flags) are skipped.
    async fn recent_violation_details(&self, limit: usize) -> Result<Vec<Vec<RiskDetail>>>;
}

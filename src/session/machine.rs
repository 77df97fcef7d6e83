//! Exam session state machine: assessments in, interventions out.
//!
//! One machine instance exists per candidate session and is the sole writer
//! of that session's state; concurrent sessions never share context or
//! history. Mid-exam persistence failures are logged and swallowed so a
//! flaky store cannot end an exam; the final completion/termination write
//! is the one write that must land.

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::{InterventionHistory, SessionContext};
use super::{MonitoringLevel, SessionStatus};
use crate::config::ProctorConfig;
use crate::detection::{AiDetectionResult, AiDetector};
use crate::error::{ProctorError, Result};
use crate::risk::factors::{BehaviorFactor, BehaviorSample};
use crate::risk::policy::{
    ActionType, InterventionPolicy, InterventionResponse, RiskLevel, WarningLevel,
};
use crate::risk::scorer::{RiskAssessment, RiskScorer};
use crate::store::{
    BehaviorLogRecord, DetectionRecord, NotificationRecord, SessionRecord, SessionStore,
    ViolationRecord, WarningRecord,
};

/// Assessments scoring above this record a violation.
const VIOLATION_RECORD_FLOOR: u8 = 30;

/// One submitted answer to a coding question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question_id: String,
    pub content: String,
}

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub final_risk_score: u8,
    pub ai_confidence_avg: f64,
    /// Average detection confidence exceeded the flag threshold
    pub flagged: bool,
    pub results: Vec<(String, AiDetectionResult)>,
}

pub struct ExamSession<'a, S, D> {
    id: String,
    user_id: String,
    exam_id: String,
    status: SessionStatus,
    risk_score: u8,
    monitoring_level: MonitoringLevel,
    warning_level: WarningLevel,
    planned_duration_secs: u32,
    started_at_ms: Option<i64>,
    inactivity_threshold_secs: u64,
    flag_threshold: u8,
    context: SessionContext,
    history: InterventionHistory,
    scorer: RiskScorer,
    policy: InterventionPolicy,
    store: &'a S,
    detector: &'a D,
}

impl<'a, S: SessionStore, D: AiDetector> ExamSession<'a, S, D> {
    pub fn new(
        config: &ProctorConfig,
        user_id: impl Into<String>,
        exam_id: impl Into<String>,
        store: &'a S,
        detector: &'a D,
    ) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(ProctorError::MissingIdentity("user id is empty".to_string()));
        }
        let exam_id = exam_id.into();
        if exam_id.trim().is_empty() {
            return Err(ProctorError::MissingIdentity("exam id is empty".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            exam_id,
            status: SessionStatus::NotStarted,
            risk_score: 0,
            monitoring_level: MonitoringLevel::Standard,
            warning_level: WarningLevel::Low,
            planned_duration_secs: config.exam.duration_secs,
            started_at_ms: None,
            inactivity_threshold_secs: config.monitor.inactivity_threshold_secs,
            flag_threshold: config.detection.flag_threshold,
            context: SessionContext::new(),
            history: InterventionHistory::new(config.policy.history_limit),
            scorer: RiskScorer::new(config.factors.clone()),
            policy: InterventionPolicy::new(config.policy.clone()),
            store,
            detector,
        })
    }

    /// Begin monitoring: persists the fresh session row and enters
    /// InProgress. A failed insert blocks the start (surfaced to the
    /// caller, retry-capable).
    pub async fn start(&mut self, now_ms: i64) -> Result<()> {
        if self.status != SessionStatus::NotStarted {
            return Err(ProctorError::InvalidState(format!(
                "cannot start from {:?}",
                self.status
            )));
        }
        let record = SessionRecord {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            exam_id: self.exam_id.clone(),
            risk_score: 0,
            warnings: 0,
            duration_secs: self.planned_duration_secs,
            completed: false,
            terminated: false,
            monitoring_level: MonitoringLevel::Standard,
            ts_ms: now_ms,
        };
        self.store.insert_session(&record).await?;
        self.status = SessionStatus::InProgress;
        self.started_at_ms = Some(now_ms);
        info!(session_id = %self.id, exam_id = %self.exam_id, "exam session started");
        Ok(())
    }

    /// Run one assessment over an aggregated behavior sample: score it,
    /// record a violation when warranted, then decide and apply the
    /// intervention. Returns the response applied, or `None` when the
    /// session already ended (late ticks are ignored, not errors).
    pub async fn tick(
        &mut self,
        sample: &BehaviorSample,
        now_ms: i64,
    ) -> Result<Option<InterventionResponse>> {
        if self.status != SessionStatus::InProgress {
            debug!(session_id = %self.id, status = ?self.status, "tick ignored");
            return Ok(None);
        }

        let assessment = self.scorer.calculate(sample);
        self.context.push_score(assessment.score, now_ms);
        debug!(session_id = %self.id, score = assessment.score, "behavior assessed");

        // Prolonged inactivity warrants a warning independently of the score.
        if let Some(idle_secs) = sample.get(BehaviorFactor::Inactivity) {
            if idle_secs >= self.inactivity_threshold_secs as f64 {
                self.record_warning(
                    "Prolonged inactivity detected.",
                    Some("Inactivity detected"),
                    now_ms,
                )
                .await?;
                if self.status.is_terminal() {
                    return Ok(None);
                }
            }
        }

        if assessment.score > VIOLATION_RECORD_FLOOR {
            self.record_violation(&assessment, now_ms).await?;
            if self.status.is_terminal() {
                return Ok(None);
            }
        }

        let decision = self.policy.recommend(assessment.score, &self.context, now_ms);
        let response = self.policy.determine_response(decision, &self.history, now_ms);
        self.apply(&response, now_ms).await?;
        self.history.push(response.clone());
        Ok(Some(response))
    }

    /// Count a warning against the session: debounced, atomically
    /// incremented at the store, and re-evaluated against the coarse
    /// warning-count policy (which can force enhanced monitoring or
    /// termination). The warning record itself is best-effort.
    pub async fn record_warning(
        &mut self,
        message: &str,
        trigger: Option<&str>,
        now_ms: i64,
    ) -> Result<()> {
        if self.status != SessionStatus::InProgress {
            return Ok(());
        }
        if !self
            .context
            .try_begin_warning(now_ms, self.policy.config().min_warning_interval_ms)
        {
            debug!(session_id = %self.id, "warning suppressed by debounce");
            return Ok(());
        }

        let count = match self.store.increment_warnings(&self.id, now_ms).await {
            Ok(count) => count,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "warning increment failed");
                return Ok(());
            }
        };
        self.context.warning_count = count;
        info!(session_id = %self.id, warnings = count, message, "warning issued");

        self.apply_warning_level(count, now_ms).await?;
        if self.status.is_terminal() {
            return Ok(());
        }

        let record = WarningRecord {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            message: message.to_string(),
            trigger: trigger.map(str::to_string),
            status: "ACTIVE".to_string(),
            ts_ms: now_ms,
        };
        if let Err(e) = self.store.insert_warning(&record).await {
            warn!(session_id = %self.id, error = %e, "warning insert failed");
        }
        Ok(())
    }

    /// Submit the exam: run AI detection over every answer (all calls
    /// complete before the final score is computed), fold the average
    /// confidence into the final risk score, and persist completion.
    /// The completion write is fatal on failure; detection-result
    /// persistence is not.
    pub async fn submit(&mut self, answers: &[Answer], now_ms: i64) -> Result<SubmitOutcome> {
        if self.status != SessionStatus::InProgress {
            return Err(ProctorError::InvalidState(format!(
                "cannot submit from {:?}",
                self.status
            )));
        }

        let mut results: Vec<(String, AiDetectionResult)> = Vec::with_capacity(answers.len());
        for answer in answers {
            let result = self.detector.detect(&answer.content).await;
            results.push((answer.question_id.clone(), result));
        }

        let avg = if results.is_empty() {
            0.0
        } else {
            results
                .iter()
                .map(|(_, r)| r.confidence_score as f64)
                .sum::<f64>()
                / results.len() as f64
        };
        let ai_score = avg.round() as u8;
        let flagged = avg > self.flag_threshold as f64;
        if flagged {
            warn!(
                session_id = %self.id,
                confidence = avg,
                "high likelihood of AI-generated content"
            );
        }

        let max_violation = self.store.max_violation_score(&self.id).await?;
        let behavior_sum = self.store.behavior_risk_sum(&self.id).await?;
        let behavior_score = (behavior_sum * 100.0).min(100.0).round() as u8;
        let final_risk_score = max_violation.max(behavior_score).max(ai_score);

        let elapsed_secs = self
            .started_at_ms
            .map(|start| ((now_ms - start) as f64 / 1000.0).round() as u32)
            .unwrap_or(0)
            .min(self.planned_duration_secs);

        self.store
            .finish_session(&self.id, false, final_risk_score, Some(elapsed_secs), now_ms)
            .await?;
        self.status = SessionStatus::Completed;
        self.risk_score = final_risk_score;

        let records: Vec<DetectionRecord> = answers
            .iter()
            .zip(&results)
            .map(|(answer, (question_id, result))| DetectionRecord {
                session_id: self.id.clone(),
                question_id: question_id.clone(),
                content_sha256: hex_sha256(&answer.content),
                confidence_score: result.confidence_score,
                is_ai_generated: result.is_ai_generated,
                explanation: result.explanation.clone(),
                errored: result.error,
                ts_ms: now_ms,
            })
            .collect();
        if !records.is_empty() {
            if let Err(e) = self.store.insert_detection_results(&records).await {
                warn!(
                    session_id = %self.id,
                    error = %e,
                    "detection result persistence failed; completing anyway"
                );
            }
        }

        if flagged {
            let violation = ViolationRecord {
                session_id: self.id.clone(),
                user_id: self.user_id.clone(),
                reason: "High likelihood of AI-generated content detected".to_string(),
                risk_score: ai_score,
                details: json!({ "averageConfidence": avg }),
                ts_ms: now_ms,
            };
            if let Err(e) = self.store.insert_violation(&violation).await {
                warn!(session_id = %self.id, error = %e, "detection violation insert failed");
            }
        }

        info!(
            session_id = %self.id,
            final_risk_score,
            ai_confidence_avg = avg,
            duration_secs = elapsed_secs,
            "exam session completed"
        );
        Ok(SubmitOutcome {
            final_risk_score,
            ai_confidence_avg: avg,
            flagged,
            results,
        })
    }

    /// Force-end the session. The status write is fatal on failure and the
    /// local state only moves once it lands; the termination violation
    /// record is best-effort.
    pub async fn terminate(&mut self, reason: &str, now_ms: i64) -> Result<()> {
        if self.status != SessionStatus::InProgress {
            return Err(ProctorError::InvalidState(format!(
                "cannot terminate from {:?}",
                self.status
            )));
        }
        self.store
            .finish_session(&self.id, true, 100, None, now_ms)
            .await?;
        self.status = SessionStatus::Terminated;
        self.risk_score = 100;

        let violation = ViolationRecord {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            reason: reason.to_string(),
            risk_score: 100,
            details: json!({
                "warningCount": self.context.warning_count,
                "warningLevel": self.warning_level,
                "terminationTime": now_ms,
            }),
            ts_ms: now_ms,
        };
        if let Err(e) = self.store.insert_violation(&violation).await {
            warn!(session_id = %self.id, error = %e, "termination violation insert failed");
        }
        self.context.record_violation(now_ms, 100);

        warn!(session_id = %self.id, reason, "exam session terminated");
        Ok(())
    }

    /// Persist a violation and its behavior-log breakdown, bump the
    /// session's stored score and warning count, and fold the violation
    /// into the session context. Each step is best-effort; a failed write
    /// skips the writes that depend on it.
    async fn record_violation(&mut self, assessment: &RiskAssessment, now_ms: i64) -> Result<()> {
        let reason = assessment
            .details
            .iter()
            .map(|d| format!("{}: {:.1}%", d.kind.as_str(), d.contribution * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        let violation = ViolationRecord {
            session_id: self.id.clone(),
            user_id: self.user_id.clone(),
            reason,
            risk_score: assessment.score,
            details: serde_json::to_value(&assessment.details).unwrap_or_default(),
            ts_ms: now_ms,
        };
        if let Err(e) = self.store.insert_violation(&violation).await {
            warn!(session_id = %self.id, error = %e, "violation insert failed");
            return Ok(());
        }

        self.risk_score = assessment.score;
        if let Err(e) = self
            .store
            .set_risk_score(&self.id, assessment.score, now_ms)
            .await
        {
            warn!(session_id = %self.id, error = %e, "risk score update failed");
            return Ok(());
        }
        let count = match self.store.increment_warnings(&self.id, now_ms).await {
            Ok(count) => count,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "warning increment failed");
                return Ok(());
            }
        };
        self.context.warning_count = count;
        self.apply_warning_level(count, now_ms).await?;
        if self.status.is_terminal() {
            return Ok(());
        }

        self.context.record_violation(now_ms, assessment.score);

        let logs: Vec<BehaviorLogRecord> = assessment
            .details
            .iter()
            .map(|d| BehaviorLogRecord {
                session_id: self.id.clone(),
                behavior_type: d.kind.as_str().to_string(),
                behavior_data: json!({ "severity": d.severity }),
                risk_contribution: d.contribution,
                ts_ms: now_ms,
            })
            .collect();
        if let Err(e) = self.store.insert_behavior_logs(&logs).await {
            warn!(session_id = %self.id, error = %e, "behavior log insert failed");
        }
        Ok(())
    }

    /// Re-evaluate the coarse warning-count policy; acts only when the
    /// level changed.
    async fn apply_warning_level(&mut self, count: u32, now_ms: i64) -> Result<()> {
        let new_level = WarningLevel::from_count(count, self.policy.config());
        if new_level == self.warning_level {
            return Ok(());
        }
        self.warning_level = new_level;
        match new_level {
            WarningLevel::High => {
                warn!(session_id = %self.id, warnings = count, "warning count forced termination");
                let reason = format!(
                    "Exam terminated due to high risk level - {} or more warnings",
                    self.policy.config().high_warning_count
                );
                self.terminate(&reason, now_ms).await?;
            }
            WarningLevel::Medium => {
                info!(session_id = %self.id, warnings = count, "enhanced monitoring enforced");
                self.set_monitoring(MonitoringLevel::Enhanced, now_ms).await;
            }
            WarningLevel::Low => {
                info!(session_id = %self.id, warnings = count, "restrictions relaxed");
                self.set_monitoring(MonitoringLevel::Standard, now_ms).await;
            }
        }
        Ok(())
    }

    async fn set_monitoring(&mut self, level: MonitoringLevel, now_ms: i64) {
        if let Err(e) = self.store.set_monitoring_level(&self.id, level, now_ms).await {
            warn!(session_id = %self.id, error = %e, "monitoring level update failed");
        }
        self.monitoring_level = level;
    }

    /// Carry out a response's actions in order. Termination short-circuits
    /// the rest.
    async fn apply(&mut self, response: &InterventionResponse, now_ms: i64) -> Result<()> {
        for action in &response.actions {
            match action.kind {
                ActionType::EndExam => {
                    self.terminate(&action.message, now_ms).await?;
                    return Ok(());
                }
                ActionType::IssueWarning | ActionType::FinalWarning => {
                    self.record_warning(&action.message, None, now_ms).await?;
                    if self.status.is_terminal() {
                        return Ok(());
                    }
                }
                ActionType::NotifyAdmin => {
                    let record = NotificationRecord {
                        session_id: self.id.clone(),
                        user_id: self.user_id.clone(),
                        message: action.message.clone(),
                        status: "PENDING".to_string(),
                        ts_ms: now_ms,
                    };
                    if let Err(e) = self.store.insert_notification(&record).await {
                        warn!(session_id = %self.id, error = %e, "admin notification failed");
                    }
                }
                ActionType::IncreaseMonitoring => {
                    self.set_monitoring(MonitoringLevel::Enhanced, now_ms).await;
                }
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn risk_score(&self) -> u8 {
        self.risk_score
    }

    /// Display-scale level for the current score.
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    pub fn warning_count(&self) -> u32 {
        self.context.warning_count
    }

    pub fn warning_level(&self) -> WarningLevel {
        self.warning_level
    }

    pub fn monitoring_level(&self) -> MonitoringLevel {
        self.monitoring_level
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn history(&self) -> &InterventionHistory {
        &self.history
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        self.started_at_ms
    }

    pub fn planned_duration_secs(&self) -> u32 {
        self.planned_duration_secs
    }
}

fn hex_sha256(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

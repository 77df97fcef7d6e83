//! Proctor Agent — client-side exam proctoring risk engine.
//!
//! Modular structure:
//! - [`telemetry`] — Behavior event accumulation over the assessment window
//! - [`risk`] — Weighted risk scoring, intervention policy, adaptive weights
//! - [`session`] — Exam session state machine and per-session context
//! - [`detection`] — AI-content detection client
//! - [`store`] — Encrypted local persistence of sessions, violations, logs
//! - [`logging`] — Structured JSON logging

pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod risk;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::ProctorConfig;
pub use detection::{AiDetectionResult, AiDetector, HttpDetector};
pub use error::{ProctorError, Result};
pub use logging::StructuredLogger;
pub use risk::{
    BehaviorFactor, BehaviorSample, InterventionPolicy, InterventionResponse, InterventionType,
    RiskAssessment, RiskLevel, RiskScorer, WarningLevel, WeightUpdater,
};
pub use session::{Answer, ExamSession, MonitoringLevel, SessionStatus, SubmitOutcome};
pub use store::{SessionStore, SqliteStore};
pub use telemetry::{TelemetryAggregator, TelemetryEvent};

//! Engine configuration. Threshold defaults mirror the deployed proctoring
//! policy; the factor table is additionally adjusted offline by the weight
//! updater.

use crate::risk::factors::FactorTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Data directory (local store)
    pub data_dir: PathBuf,
    /// Exam parameters
    pub exam: ExamConfig,
    /// Telemetry window / assessment cadence
    pub monitor: MonitorConfig,
    /// Scoring weights and saturation thresholds
    pub factors: FactorTable,
    /// Intervention and escalation thresholds
    pub policy: PolicyConfig,
    /// AI-content detection endpoint
    pub detection: DetectionConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Planned exam duration (seconds)
    pub duration_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Periodic assessment interval (seconds)
    pub assessment_interval_secs: u64,
    /// Idle time that counts as an inactivity violation (seconds)
    pub inactivity_threshold_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Score at or above which the exam is terminated
    pub terminate_score: u8,
    /// Score at or above which a warning is issued
    pub warning_score: u8,
    /// Score at or above which monitoring is increased
    pub monitor_score: u8,
    /// Recent violations that force a warning regardless of score
    pub recent_violation_limit: usize,
    /// Trailing window for "recent" violations and warnings (milliseconds)
    pub lookback_ms: i64,
    /// Warning-type responses inside the window that escalate the next one
    pub escalation_warning_limit: usize,
    /// Intervention responses retained per session
    pub history_limit: usize,
    /// Minimum interval between issued warnings (milliseconds)
    pub min_warning_interval_ms: i64,
    /// Cumulative warnings forcing termination
    pub high_warning_count: u32,
    /// Cumulative warnings forcing enhanced monitoring
    pub medium_warning_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Detection API endpoint; when unset the detector runs in no-op mode
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Average confidence above which submitted content is flagged
    pub flag_threshold: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .map(|d| d.join("proctor-agent"))
                .unwrap_or_else(|| PathBuf::from(".proctor")),
            exam: ExamConfig::default(),
            monitor: MonitorConfig::default(),
            factors: FactorTable::default(),
            policy: PolicyConfig::default(),
            detection: DetectionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        // 2 hours
        Self { duration_secs: 7200 }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            assessment_interval_secs: 300,
            inactivity_threshold_secs: 30,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            terminate_score: 80,
            warning_score: 50,
            monitor_score: 30,
            recent_violation_limit: 3,
            lookback_ms: 300_000,
            escalation_warning_limit: 2,
            history_limit: 10,
            min_warning_interval_ms: 3000,
            high_warning_count: 10,
            medium_warning_count: 5,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 15,
            connect_timeout_secs: 5,
            flag_threshold: 70,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ProctorConfig {
    /// Load from JSON file if present; otherwise return default
    pub fn load(path: &std::path::Path) -> Self {
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(path) {
                if let Ok(c) = serde_json::from_str::<ProctorConfig>(&data) {
                    return c;
                }
            }
        }
        Self::default()
    }
}

//! End-to-end session tests: lifecycle transitions, violation recording,
//! coarse warning-count policy, submission with AI detection, and the
//! encrypted store.

use proctor_agent::config::{DetectionConfig, ProctorConfig};
use proctor_agent::detection::{AiDetectionResult, AiDetector, HttpDetector};
use proctor_agent::risk::{
    ActionType, BehaviorFactor, BehaviorSample, InterventionType, RiskDetail, WarningLevel,
    WeightUpdater,
};
use proctor_agent::session::{Answer, ExamSession, MonitoringLevel, SessionStatus};
use proctor_agent::store::{SessionRecord, SessionStore, SqliteStore, ViolationRecord};

const T0: i64 = 1_000_000;

struct StaticDetector {
    confidence: u8,
}

impl AiDetector for StaticDetector {
    async fn detect(&self, content: &str) -> AiDetectionResult {
        if content.is_empty() {
            return AiDetectionResult::failure("content is required");
        }
        AiDetectionResult {
            confidence_score: self.confidence,
            explanation: "analysis completed".to_string(),
            is_ai_generated: self.confidence > 70,
            error: false,
        }
    }
}

struct FailingDetector;

impl AiDetector for FailingDetector {
    async fn detect(&self, _content: &str) -> AiDetectionResult {
        AiDetectionResult::failure("service unavailable")
    }
}

fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
    SqliteStore::open(&dir.path().join("proctor.db"), b"test-secret").unwrap()
}

fn sample(pairs: &[(BehaviorFactor, f64)]) -> BehaviorSample {
    let mut s = BehaviorSample::new();
    for &(factor, value) in pairs {
        s.set(factor, value);
    }
    s
}

#[test]
fn config_load_default() {
    let c = ProctorConfig::load(std::path::Path::new("nonexistent.json"));
    assert_eq!(c.exam.duration_secs, 7200);
    assert_eq!(c.policy.terminate_score, 80);
    assert_eq!(c.policy.high_warning_count, 10);
    assert!((c.factors.tab_switch.weight - 0.3).abs() < 1e-9);
    assert!(c.detection.endpoint.is_none());
}

#[test]
fn empty_user_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    assert!(ExamSession::new(&config, "  ", "EXAM1", &store, &detector).is_err());
}

#[tokio::test]
async fn store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let record = SessionRecord {
        id: "s1".to_string(),
        user_id: "u1".to_string(),
        exam_id: "EXAM1_u1".to_string(),
        risk_score: 0,
        warnings: 0,
        duration_secs: 7200,
        completed: false,
        terminated: false,
        monitoring_level: MonitoringLevel::Standard,
        ts_ms: T0,
    };
    store.insert_session(&record).await.unwrap();

    assert_eq!(store.increment_warnings("s1", T0 + 1).await.unwrap(), 1);
    assert_eq!(store.increment_warnings("s1", T0 + 2).await.unwrap(), 2);

    store
        .set_monitoring_level("s1", MonitoringLevel::Enhanced, T0 + 3)
        .await
        .unwrap();

    let snapshot = store.session_snapshot("s1").unwrap().unwrap();
    assert_eq!(snapshot.warnings, 2);
    assert_eq!(snapshot.monitoring_level, MonitoringLevel::Enhanced);
    assert!(!snapshot.completed);

    let details = vec![RiskDetail {
        kind: BehaviorFactor::TabSwitch,
        severity: 1.0,
        contribution: 0.3,
    }];
    for (score, ts) in [(40u8, T0 + 10), (70u8, T0 + 20)] {
        store
            .insert_violation(&ViolationRecord {
                session_id: "s1".to_string(),
                user_id: "u1".to_string(),
                reason: "tabSwitch: 30.0%".to_string(),
                risk_score: score,
                details: serde_json::to_value(&details).unwrap(),
                ts_ms: ts,
            })
            .await
            .unwrap();
    }
    // Termination-style payloads are not factor breakdowns
    store
        .insert_violation(&ViolationRecord {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            reason: "terminated".to_string(),
            risk_score: 100,
            details: serde_json::json!({ "warningCount": 10 }),
            ts_ms: T0 + 30,
        })
        .await
        .unwrap();

    assert_eq!(store.max_violation_score("s1").await.unwrap(), 100);
    assert_eq!(store.violation_count("s1").unwrap(), 3);

    let history = store.recent_violation_details(1000).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0][0].kind, BehaviorFactor::TabSwitch);
}

#[tokio::test]
async fn monitor_intervention_raises_monitoring_level() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();
    assert_eq!(session.status(), SessionStatus::InProgress);

    // Score exactly 30: monitor intervention, but below the violation floor
    let response = session
        .tick(&sample(&[(BehaviorFactor::TabSwitch, 3.0)]), T0 + 1_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.kind, InterventionType::Monitor);
    assert_eq!(session.monitoring_level(), MonitoringLevel::Enhanced);
    assert_eq!(store.violation_count(session.id()).unwrap(), 0);

    let snapshot = store.session_snapshot(session.id()).unwrap().unwrap();
    assert_eq!(snapshot.monitoring_level, MonitoringLevel::Enhanced);
}

#[tokio::test]
async fn critical_score_terminates_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    // 0.3 + 0.25 + 0.15 + 0.1 saturated: score 80
    let response = session
        .tick(
            &sample(&[
                (BehaviorFactor::TabSwitch, 3.0),
                (BehaviorFactor::MouseLeave, 2.0),
                (BehaviorFactor::RapidMovement, 10.0),
                (BehaviorFactor::CopyPaste, 1.0),
            ]),
            T0 + 1_000,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.kind, InterventionType::Terminate);
    assert_eq!(response.actions[0].kind, ActionType::EndExam);

    assert_eq!(session.status(), SessionStatus::Terminated);
    assert_eq!(session.risk_score(), 100);
    let snapshot = store.session_snapshot(session.id()).unwrap().unwrap();
    assert!(snapshot.terminated);
    assert!(snapshot.completed);
    assert_eq!(snapshot.risk_score, 100);
    // Scoring violation plus the termination violation
    assert_eq!(store.violation_count(session.id()).unwrap(), 2);

    // No orphaned assessments after the terminal state
    let late = session
        .tick(&sample(&[(BehaviorFactor::TabSwitch, 3.0)]), T0 + 2_000)
        .await
        .unwrap();
    assert!(late.is_none());
}

#[tokio::test]
async fn warning_count_ten_forces_termination() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    for i in 0..10u32 {
        let now = T0 + (i as i64 + 1) * 3_500;
        session
            .record_warning("Warning: Tab switching detected.", Some("Tab switch detected"), now)
            .await
            .unwrap();
        if i == 4 {
            assert_eq!(session.warning_level(), WarningLevel::Medium);
            assert_eq!(session.monitoring_level(), MonitoringLevel::Enhanced);
        }
    }

    assert_eq!(session.warning_count(), 10);
    assert_eq!(session.warning_level(), WarningLevel::High);
    assert_eq!(session.status(), SessionStatus::Terminated);
    assert_eq!(session.risk_score(), 100);

    let snapshot = store.session_snapshot(session.id()).unwrap().unwrap();
    assert!(snapshot.terminated);
    assert_eq!(snapshot.risk_score, 100);
    assert_eq!(snapshot.warnings, 10);
    assert_eq!(store.violation_count(session.id()).unwrap(), 1);

    // Further warnings are ignored once terminal
    session
        .record_warning("Warning: Tab switching detected.", None, T0 + 60_000)
        .await
        .unwrap();
    let snapshot = store.session_snapshot(session.id()).unwrap().unwrap();
    assert_eq!(snapshot.warnings, 10);
}

#[tokio::test]
async fn rapid_fire_warnings_are_debounced() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    session
        .record_warning("Warning: Mouse left exam window.", None, T0 + 1_000)
        .await
        .unwrap();
    // Overlapping handlers fire again within the 3-second interval
    session
        .record_warning("Warning: Mouse left exam window.", None, T0 + 1_500)
        .await
        .unwrap();
    session
        .record_warning("Warning: Mouse left exam window.", None, T0 + 2_900)
        .await
        .unwrap();
    assert_eq!(session.warning_count(), 1);

    session
        .record_warning("Warning: Mouse left exam window.", None, T0 + 4_500)
        .await
        .unwrap();
    assert_eq!(session.warning_count(), 2);
}

#[tokio::test]
async fn third_recent_warning_escalates() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    // 0.3 + 0.25 saturated: score 55, a warning-class assessment
    let warning_sample = sample(&[
        (BehaviorFactor::TabSwitch, 3.0),
        (BehaviorFactor::MouseLeave, 2.0),
    ]);

    let first = session
        .tick(&warning_sample, T0 + 1_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.kind, InterventionType::Warning);
    assert_eq!(first.actions[0].kind, ActionType::IssueWarning);

    let second = session
        .tick(&warning_sample, T0 + 5_000)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.actions[0].kind, ActionType::IssueWarning);

    let third = session
        .tick(&warning_sample, T0 + 9_000)
        .await
        .unwrap()
        .unwrap();
    let kinds: Vec<ActionType> = third.actions.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionType::FinalWarning, ActionType::NotifyAdmin]);
    assert_eq!(session.status(), SessionStatus::InProgress);
}

#[tokio::test]
async fn submit_folds_detection_average_into_final_score() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 90 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    let answers = vec![
        Answer {
            question_id: "q3".to_string(),
            content: "function twoSum(nums, target) {}".to_string(),
        },
        Answer {
            question_id: "q4".to_string(),
            content: "function isValid(s) {}".to_string(),
        },
    ];
    let outcome = session.submit(&answers, T0 + 600_000).await.unwrap();

    assert!((outcome.ai_confidence_avg - 90.0).abs() < 1e-9);
    assert!(outcome.flagged);
    assert_eq!(outcome.final_risk_score, 90);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(session.status(), SessionStatus::Completed);

    let snapshot = store.session_snapshot(session.id()).unwrap().unwrap();
    assert!(snapshot.completed);
    assert!(!snapshot.terminated);
    assert_eq!(snapshot.risk_score, 90);
    assert_eq!(snapshot.duration_secs, 600);
    // The high-confidence flag records one extra violation
    assert_eq!(store.violation_count(session.id()).unwrap(), 1);
}

#[tokio::test]
async fn final_score_is_max_of_violation_behavior_and_ai() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 20 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    session
        .tick(
            &sample(&[
                (BehaviorFactor::TabSwitch, 3.0),
                (BehaviorFactor::MouseLeave, 2.0),
            ]),
            T0 + 1_000,
        )
        .await
        .unwrap();
    assert_eq!(session.risk_score(), 55);

    let answers = vec![Answer {
        question_id: "q3".to_string(),
        content: "let x = 1;".to_string(),
    }];
    let outcome = session.submit(&answers, T0 + 120_000).await.unwrap();
    assert_eq!(outcome.final_risk_score, 55);
    assert!(!outcome.flagged);
}

#[tokio::test]
async fn detector_failure_never_blocks_submission() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = FailingDetector;
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();

    let answers = vec![Answer {
        question_id: "q3".to_string(),
        content: "let x = 1;".to_string(),
    }];
    let outcome = session.submit(&answers, T0 + 60_000).await.unwrap();

    assert_eq!(outcome.final_risk_score, 0);
    assert!(!outcome.flagged);
    assert!(outcome.results[0].1.error);
    assert_eq!(outcome.results[0].1.confidence_score, 0);
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[tokio::test]
async fn submit_twice_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let detector = StaticDetector { confidence: 0 };
    let config = ProctorConfig::default();
    let mut session = ExamSession::new(&config, "u1", "EXAM1_u1", &store, &detector).unwrap();
    session.start(T0).await.unwrap();
    session.submit(&[], T0 + 60_000).await.unwrap();
    assert!(session.submit(&[], T0 + 61_000).await.is_err());
    assert!(session.start(T0 + 62_000).await.is_err());
}

#[tokio::test]
async fn weight_refresh_blends_history_into_factors() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);

    let details = vec![RiskDetail {
        kind: BehaviorFactor::TabSwitch,
        severity: 1.0,
        contribution: 0.3,
    }];
    store
        .insert_violation(&ViolationRecord {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            reason: "tabSwitch: 30.0%".to_string(),
            risk_score: 40,
            details: serde_json::to_value(&details).unwrap(),
            ts_ms: T0,
        })
        .await
        .unwrap();

    let updater = WeightUpdater::default();
    let mut factors = ProctorConfig::default().factors;
    updater.refresh(&store, &mut factors).await.unwrap();

    // tabSwitch appeared in every violation with severity 1:
    // computed = (1 + 1) / 2, blended 0.8 * 0.3 + 0.2 * 1.0
    assert!((factors.tab_switch.weight - 0.44).abs() < 1e-9);
    // Absent factors decay toward zero
    assert!((factors.mouse_leave.weight - 0.2).abs() < 1e-9);
    // Thresholds are untouched
    assert!((factors.tab_switch.threshold - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn unconfigured_detector_degrades_to_default() {
    let detector = HttpDetector::new(&DetectionConfig::default());
    assert!(!detector.enabled());

    let result = detector.detect("let x = 1;").await;
    assert!(result.error);
    assert_eq!(result.confidence_score, 0);
    assert!(!result.is_ai_generated);

    // Empty content is rejected before any endpoint is consulted
    let empty = detector.detect("").await;
    assert!(empty.error);
}

#[tokio::test]
async fn weight_refresh_without_history_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let updater = WeightUpdater::default();
    let mut factors = ProctorConfig::default().factors;
    updater.refresh(&store, &mut factors).await.unwrap();
    assert!((factors.tab_switch.weight - 0.3).abs() < 1e-9);
}

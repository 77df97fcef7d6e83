//! Proctor agent entrypoint: drives one exam session from an ndjson
//! telemetry stream on stdin (the replay stand-in for the browser event
//! loop), with periodic assessments on a timer, and submits on Ctrl+C,
//! stream end, or exam-time expiry. Intervention responses and the final
//! summary go to stdout as JSON lines; logs go to stderr.

use proctor_agent::{
    config::ProctorConfig,
    detection::{AiDetector, HttpDetector},
    logging::{LogEvent, StructuredLogger},
    risk::{InterventionType, WarningLevel, WeightUpdater},
    session::{Answer, ExamSession},
    store::{SessionStore, SqliteStore},
    telemetry::{TelemetryAggregator, TelemetryEvent},
};

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};

/// One line of replay input.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayLine {
    Telemetry { event: TelemetryEvent },
    Answer { question_id: String, content: String },
    Submit,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Warning message and trigger label for events that warn the candidate
/// directly.
fn warning_for(event: &TelemetryEvent) -> Option<(&'static str, &'static str)> {
    match event {
        TelemetryEvent::TabHidden => Some((
            "Warning: Tab switching detected.",
            "Tab switch detected",
        )),
        TelemetryEvent::RestrictedKeyCombo => Some((
            "Warning: Keyboard shortcuts are not allowed during the exam.",
            "Tab switch attempt",
        )),
        TelemetryEvent::MouseLeftTop => Some((
            "Warning: Mouse left exam window.",
            "Mouse left exam window",
        )),
        TelemetryEvent::Copy => Some((
            "Warning: Copying is not allowed during the exam.",
            "Copy attempt",
        )),
        TelemetryEvent::Cut => Some((
            "Warning: Cutting is not allowed during the exam.",
            "Cut attempt",
        )),
        TelemetryEvent::Paste => Some((
            "Warning: Pasting is not allowed during the exam.",
            "Paste attempt",
        )),
        _ => None,
    }
}

async fn run_assessment<S: SessionStore, D: AiDetector>(
    session: &mut ExamSession<'_, S, D>,
    aggregator: &TelemetryAggregator,
) {
    let now = now_ms();
    let Some(sample) = aggregator.snapshot(now) else {
        return;
    };
    match session.tick(&sample, now).await {
        Ok(Some(response)) => {
            if response.kind != InterventionType::None {
                StructuredLogger::emit_json(&response, &mut std::io::stdout());
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "assessment failed"),
    }
}

async fn submit_session<S: SessionStore, D: AiDetector>(
    session: &mut ExamSession<'_, S, D>,
    answers: &[Answer],
) {
    if session.status().is_terminal() {
        return;
    }
    match session.submit(answers, now_ms()).await {
        Ok(outcome) => {
            let summary = json!({
                "sessionId": session.id(),
                "finalRiskScore": outcome.final_risk_score,
                "riskLevel": session.risk_level(),
                "aiConfidenceAvg": outcome.ai_confidence_avg,
                "flagged": outcome.flagged,
            });
            StructuredLogger::emit_json(&summary, &mut std::io::stdout());
        }
        Err(e) => {
            tracing::error!(error = %e, "submission failed");
            let error = e.to_string();
            let event = LogEvent {
                ts: Utc::now().to_rfc3339(),
                level: "error",
                target: "proctor_agent",
                message: "exam submission failed",
                session_id: Some(session.id()),
                risk_score: Some(session.risk_score()),
                risk_level: None,
                intervention: None,
                error: Some(&error),
            };
            StructuredLogger::emit_json(&event, &mut std::io::stdout());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config_path = std::env::var("PROCTOR_CONFIG_PATH")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("config.json"));
    let config = ProctorConfig::load(&config_path);

    StructuredLogger::init(config.log.json, &config.log.level);

    info!(data_dir = ?config.data_dir, "proctor agent starting");

    std::fs::create_dir_all(&config.data_dir)?;
    let store_path = config.data_dir.join("proctor.db");
    let secret = b"candidate-device-secret"; // In production: from Secure Enclave / Keystore
    let store = SqliteStore::open(&store_path, secret)?;
    let detector = HttpDetector::new(&config.detection);

    let user_id =
        std::env::var("PROCTOR_USER_ID").unwrap_or_else(|_| "local-candidate".to_string());
    let exam_id = format!("EXAM1_{}", user_id);

    let mut session = ExamSession::new(&config, user_id, exam_id, &store, &detector)?;
    session.start(now_ms()).await?;
    let aggregator = TelemetryAggregator::new(&config.monitor, now_ms());

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        let _ = ctrlc::set_handler(move || shutdown.notify_one());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.monitor.assessment_interval_secs));
    // interval fires immediately; the startup tick carries no telemetry
    ticker.tick().await;
    let deadline = tokio::time::sleep(Duration::from_secs(config.exam.duration_secs as u64));
    tokio::pin!(deadline);

    let mut answers: Vec<Answer> = Vec::new();
    let mut stdin_open = true;

    loop {
        if session.status().is_terminal() {
            break;
        }
        tokio::select! {
            _ = shutdown.notified() => {
                info!("shutdown requested; submitting exam");
                submit_session(&mut session, &answers).await;
                break;
            }
            _ = &mut deadline => {
                info!("exam time expired; submitting");
                submit_session(&mut session, &answers).await;
                break;
            }
            _ = ticker.tick() => {
                run_assessment(&mut session, &aggregator).await;
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("telemetry stream ended; submitting exam");
                        submit_session(&mut session, &answers).await;
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ReplayLine>(&line) {
                    Ok(ReplayLine::Telemetry { event }) => {
                        let now = now_ms();
                        // Restricted combos only count once restrictions are active
                        if matches!(event, TelemetryEvent::RestrictedKeyCombo)
                            && session.warning_level() == WarningLevel::Low
                        {
                            continue;
                        }
                        aggregator.record(&event, now);
                        if let Some((message, trigger)) = warning_for(&event) {
                            if let Err(e) =
                                session.record_warning(message, Some(trigger), now).await
                            {
                                warn!(error = %e, "warning processing failed");
                            }
                        }
                        if event.is_trigger() && !session.status().is_terminal() {
                            run_assessment(&mut session, &aggregator).await;
                        }
                    }
                    Ok(ReplayLine::Answer { question_id, content }) => {
                        answers.push(Answer { question_id, content });
                    }
                    Ok(ReplayLine::Submit) => {
                        submit_session(&mut session, &answers).await;
                        break;
                    }
                    Err(e) => warn!(error = %e, "unparseable input line"),
                }
            }
        }
    }

    info!(
        session_id = %session.id(),
        status = ?session.status(),
        risk_score = session.risk_score(),
        warnings = session.warning_count(),
        keystrokes = aggregator.keystrokes(),
        "session finished"
    );

    // Offline weight adaptation from accumulated history, out of the
    // scoring hot path.
    let updater = WeightUpdater::default();
    let mut factors = config.factors.clone();
    if let Err(e) = updater.refresh(&store, &mut factors).await {
        warn!(error = %e, "weight refresh failed");
    }

    info!("proctor agent stopping");
    Ok(())
}

//! SQLite-backed store with AES-GCM encryption of behavioral payload
//! columns. Key derived from a device-bound secret (in production: Secure
//! Enclave / Keystore / DPAPI).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    BehaviorLogRecord, DetectionRecord, NotificationRecord, SessionRecord, SessionStore,
    ViolationRecord, WarningRecord,
};
use crate::error::{ProctorError, Result};
use crate::risk::scorer::RiskDetail;
use crate::session::MonitoringLevel;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProctorError::Store(format!("cipher init: {:?}", e)))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| ProctorError::Store("payload encryption failed".to_string()))?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|e| ProctorError::Store(e.to_string()))?;
    if raw.len() < NONCE_LEN {
        return Err(ProctorError::Store("payload too short".to_string()));
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ProctorError::Store(format!("cipher init: {:?}", e)))?;
    cipher
        .decrypt(nonce.into(), ct)
        .map_err(|_| ProctorError::Store("payload decryption failed".to_string()))
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl SqliteStore {
    /// Open or create DB at path. Key is derived from `secret` (in
    /// production: device-bound).
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                exam_id TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                warnings INTEGER NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                terminated INTEGER NOT NULL,
                monitoring_level TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS violations (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                reason TEXT NOT NULL,
                details_enc TEXT NOT NULL,
                ts INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_violations_session ON violations(session_id);
            CREATE INDEX IF NOT EXISTS idx_violations_ts ON violations(ts);
            CREATE TABLE IF NOT EXISTS behavior_logs (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                behavior_type TEXT NOT NULL,
                data_enc TEXT NOT NULL,
                risk_contribution REAL NOT NULL,
                ts INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_behavior_session ON behavior_logs(session_id);
            CREATE TABLE IF NOT EXISTS warnings (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                trigger_type TEXT,
                status TEXT NOT NULL,
                ts INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL,
                ts INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS detections (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                content_sha256 TEXT NOT NULL,
                confidence INTEGER NOT NULL,
                ai_generated INTEGER NOT NULL,
                explanation TEXT NOT NULL,
                errored INTEGER NOT NULL,
                ts INTEGER NOT NULL
            );
            "#,
        )?;
        let key = derive_key(secret);
        Ok(Self {
            conn: Mutex::new(conn),
            key,
        })
    }

    /// Read a session row back (tests and review tooling).
    pub fn session_snapshot(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, exam_id, risk_score, warnings, duration_secs,
                    completed, terminated, monitoring_level, created_at
             FROM sessions WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![session_id])?;
        if let Some(row) = rows.next()? {
            let level: String = row.get(8)?;
            return Ok(Some(SessionRecord {
                id: row.get(0)?,
                user_id: row.get(1)?,
                exam_id: row.get(2)?,
                risk_score: row.get::<_, i64>(3)? as u8,
                warnings: row.get::<_, i64>(4)? as u32,
                duration_secs: row.get::<_, i64>(5)? as u32,
                completed: row.get::<_, i64>(6)? != 0,
                terminated: row.get::<_, i64>(7)? != 0,
                monitoring_level: if level == "ENHANCED" {
                    MonitoringLevel::Enhanced
                } else {
                    MonitoringLevel::Standard
                },
                ts_ms: row.get(9)?,
            }));
        }
        Ok(None)
    }

    pub fn violation_count(&self, session_id: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM violations WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}

impl SessionStore for SqliteStore {
    async fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO sessions (id, user_id, exam_id, risk_score, warnings, duration_secs,
                                   completed, terminated, monitoring_level, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                record.id,
                record.user_id,
                record.exam_id,
                record.risk_score,
                record.warnings,
                record.duration_secs,
                record.completed,
                record.terminated,
                record.monitoring_level.as_str(),
                record.ts_ms,
            ],
        )?;
        Ok(())
    }

    async fn finish_session(
        &self,
        session_id: &str,
        terminated: bool,
        risk_score: u8,
        duration_secs: Option<u32>,
        now_ms: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = match duration_secs {
            Some(duration) => conn.execute(
                "UPDATE sessions SET completed = 1, terminated = ?2, risk_score = ?3,
                        duration_secs = ?4, updated_at = ?5 WHERE id = ?1",
                params![session_id, terminated, risk_score, duration, now_ms],
            )?,
            None => conn.execute(
                "UPDATE sessions SET completed = 1, terminated = ?2, risk_score = ?3,
                        updated_at = ?4 WHERE id = ?1",
                params![session_id, terminated, risk_score, now_ms],
            )?,
        };
        if n == 0 {
            return Err(ProctorError::Store(format!(
                "session not found: {}",
                session_id
            )));
        }
        Ok(())
    }

    async fn set_risk_score(&self, session_id: &str, score: u8, now_ms: i64) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "UPDATE sessions SET risk_score = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, score, now_ms],
        )?;
        Ok(())
    }

    async fn increment_warnings(&self, session_id: &str, now_ms: i64) -> Result<u32> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "UPDATE sessions SET warnings = warnings + 1, updated_at = ?2
             WHERE id = ?1 RETURNING warnings",
            params![session_id, now_ms],
            |r| r.get(0),
        )?;
        Ok(count as u32)
    }

    async fn set_monitoring_level(
        &self,
        session_id: &str,
        level: MonitoringLevel,
        now_ms: i64,
    ) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "UPDATE sessions SET monitoring_level = ?2, updated_at = ?3 WHERE id = ?1",
            params![session_id, level.as_str(), now_ms],
        )?;
        Ok(())
    }

    async fn insert_violation(&self, violation: &ViolationRecord) -> Result<()> {
        let details = serde_json::to_string(&violation.details)?;
        let enc = encrypt(&self.key, details.as_bytes())?;
        self.conn.lock().unwrap().execute(
            "INSERT INTO violations (id, session_id, user_id, risk_score, reason, details_enc, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                violation.session_id,
                violation.user_id,
                violation.risk_score,
                violation.reason,
                enc,
                violation.ts_ms,
            ],
        )?;
        Ok(())
    }

    async fn insert_behavior_logs(&self, logs: &[BehaviorLogRecord]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for log in logs {
            let data = serde_json::to_string(&log.behavior_data)?;
            let enc = encrypt(&self.key, data.as_bytes())?;
            conn.execute(
                "INSERT INTO behavior_logs (id, session_id, behavior_type, data_enc,
                                            risk_contribution, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    log.session_id,
                    log.behavior_type,
                    enc,
                    log.risk_contribution,
                    log.ts_ms,
                ],
            )?;
        }
        Ok(())
    }

    async fn insert_warning(&self, warning: &WarningRecord) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO warnings (id, session_id, user_id, message, trigger_type, status, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                warning.session_id,
                warning.user_id,
                warning.message,
                warning.trigger,
                warning.status,
                warning.ts_ms,
            ],
        )?;
        Ok(())
    }

    async fn insert_notification(&self, notification: &NotificationRecord) -> Result<()> {
        self.conn.lock().unwrap().execute(
            "INSERT INTO notifications (id, session_id, user_id, message, status, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                notification.session_id,
                notification.user_id,
                notification.message,
                notification.status,
                notification.ts_ms,
            ],
        )?;
        Ok(())
    }

    async fn insert_detection_results(&self, results: &[DetectionRecord]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for result in results {
            conn.execute(
                "INSERT INTO detections (id, session_id, question_id, content_sha256,
                                         confidence, ai_generated, explanation, errored, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    Uuid::new_v4().to_string(),
                    result.session_id,
                    result.question_id,
                    result.content_sha256,
                    result.confidence_score,
                    result.is_ai_generated,
                    result.explanation,
                    result.errored,
                    result.ts_ms,
                ],
            )?;
        }
        Ok(())
    }

    async fn max_violation_score(&self, session_id: &str) -> Result<u8> {
        let conn = self.conn.lock().unwrap();
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(risk_score) FROM violations WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?;
        Ok(max.unwrap_or(0) as u8)
    }

    async fn behavior_risk_sum(&self, session_id: &str) -> Result<f64> {
        let conn = self.conn.lock().unwrap();
        let sum: Option<f64> = conn.query_row(
            "SELECT SUM(risk_contribution) FROM behavior_logs WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?;
        Ok(sum.unwrap_or(0.0))
    }

    async fn recent_violation_details(&self, limit: usize) -> Result<Vec<Vec<RiskDetail>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT details_enc FROM violations ORDER BY ts DESC LIMIT ?1")?;
        let encoded: Vec<String> = stmt
            .query_map(params![limit as i64], |r| r.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        let mut out = Vec::new();
        for enc in encoded {
            let plain = decrypt(&self.key, &enc)?;
            // Termination and detection violations carry non-breakdown payloads
            if let Ok(details) = serde_json::from_slice::<Vec<RiskDetail>>(&plain) {
                out.push(details);
            }
        }
        Ok(out)
    }
}

//! HTTP client for the AI-content-detection API. If no endpoint is
//! configured, the detector runs in no-op mode (every call reports the
//! failure default).

use super::{AiDetectionResult, AiDetector};
use crate::config::DetectionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Serialize)]
struct DetectRequest<'a> {
    content: &'a str,
}

/// Raw API response; fields beyond the score are optional on the wire.
#[derive(Deserialize)]
struct DetectResponse {
    #[serde(rename = "confidenceScore")]
    confidence_score: f64,
    explanation: Option<String>,
    #[serde(rename = "isAIGenerated")]
    is_ai_generated: Option<bool>,
}

pub struct HttpDetector {
    client: Option<reqwest::Client>,
    endpoint: String,
}

impl HttpDetector {
    /// Build from config. A missing endpoint or an unbuildable client puts
    /// the detector in no-op mode rather than failing construction.
    pub fn new(config: &DetectionConfig) -> Self {
        let Some(endpoint) = config.endpoint.clone() else {
            warn!("no detection endpoint configured; AI detection disabled");
            return Self {
                client: None,
                endpoint: String::new(),
            };
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build();
        match client {
            Ok(client) => Self {
                client: Some(client),
                endpoint,
            },
            Err(e) => {
                warn!(error = %e, "detection client build failed; AI detection disabled");
                Self {
                    client: None,
                    endpoint: String::new(),
                }
            }
        }
    }

    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    async fn call(&self, client: &reqwest::Client, content: &str) -> Result<AiDetectionResult, String> {
        let res = client
            .post(&self.endpoint)
            .json(&DetectRequest { content })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("{} {}", status, text));
        }
        let body: DetectResponse = res.json().await.map_err(|e| e.to_string())?;
        Ok(AiDetectionResult {
            confidence_score: body.confidence_score.round().clamp(0.0, 100.0) as u8,
            explanation: body
                .explanation
                .unwrap_or_else(|| "No explanation provided".to_string()),
            is_ai_generated: body.is_ai_generated.unwrap_or(false),
            error: false,
        })
    }
}

impl AiDetector for HttpDetector {
    async fn detect(&self, content: &str) -> AiDetectionResult {
        if content.is_empty() {
            return AiDetectionResult::failure("content is required");
        }
        let Some(ref client) = self.client else {
            return AiDetectionResult::failure("detection not configured");
        };
        match self.call(client, content).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "AI detection call failed");
                AiDetectionResult::failure(e)
            }
        }
    }
}

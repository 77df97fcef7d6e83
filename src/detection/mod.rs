//! AI-content detection over submitted answers.

mod client;

pub use client::HttpDetector;

use serde::{Deserialize, Serialize};

/// Outcome of analyzing one piece of submitted content. A failed call is
/// reported as a zero-confidence result with `error` set; detection never
/// blocks exam submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiDetectionResult {
    #[serde(rename = "confidenceScore")]
    pub confidence_score: u8,
    pub explanation: String,
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    #[serde(default)]
    pub error: bool,
}

impl AiDetectionResult {
    /// Default substituted when detection cannot run.
    pub fn failure(reason: impl std::fmt::Display) -> Self {
        Self {
            confidence_score: 0,
            explanation: format!("Unable to perform AI detection: {}", reason),
            is_ai_generated: false,
            error: true,
        }
    }
}

/// Detection collaborator. Implementations degrade to
/// [`AiDetectionResult::failure`] instead of returning errors.
#[allow(async_fn_in_trait)]
pub trait AiDetector {
    async fn detect(&self, content: &str) -> AiDetectionResult;
}

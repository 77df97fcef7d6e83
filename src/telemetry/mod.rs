//! Raw behavioral telemetry from the exam client: event kinds and the
//! per-session aggregation window.

mod aggregator;

pub use aggregator::TelemetryAggregator;

use serde::{Deserialize, Serialize};

/// One observed client-side event. Trigger events (tab hidden, mouse leaving
/// the top edge, clipboard use, restricted key combos) feed the violation
/// counters; input events only refresh the activity clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    TabHidden,
    RestrictedKeyCombo,
    MouseLeftTop,
    Copy,
    Cut,
    Paste,
    Keystroke,
    MouseMove { x: f64, y: f64 },
    Activity,
}

impl TelemetryEvent {
    /// Events that trigger an immediate assessment in addition to the
    /// periodic one.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            TelemetryEvent::TabHidden
                | TelemetryEvent::RestrictedKeyCombo
                | TelemetryEvent::MouseLeftTop
                | TelemetryEvent::Copy
                | TelemetryEvent::Cut
                | TelemetryEvent::Paste
        )
    }
}

/// One point of the mouse trail used for movement-intensity estimation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MouseSample {
    pub x: f64,
    pub y: f64,
    pub ts_ms: i64,
}

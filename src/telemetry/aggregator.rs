//! Telemetry window: counters accumulate between assessments and are
//! snapshot-and-reset in one step, so a periodic tick and an event-triggered
//! tick racing on the same window cannot double-count.

use super::{MouseSample, TelemetryEvent};
use crate::config::MonitorConfig;
use crate::risk::factors::{BehaviorFactor, BehaviorSample};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Counters {
    tab_switches: u32,
    mouse_leaves: u32,
    copy_paste_attempts: u32,
    keystrokes: u64,
    trail: Vec<MouseSample>,
    last_activity_ms: i64,
}

pub struct TelemetryAggregator {
    inactivity_threshold_ms: i64,
    inner: Mutex<Counters>,
}

impl TelemetryAggregator {
    pub fn new(config: &MonitorConfig, now_ms: i64) -> Self {
        Self {
            inactivity_threshold_ms: config.inactivity_threshold_secs as i64 * 1000,
            inner: Mutex::new(Counters {
                last_activity_ms: now_ms,
                ..Counters::default()
            }),
        }
    }

    /// Fold one client event into the window. Input events refresh the
    /// activity clock; trigger events bump their violation counter.
    pub fn record(&self, event: &TelemetryEvent, now_ms: i64) {
        let mut c = self.inner.lock().expect("lock");
        match event {
            TelemetryEvent::TabHidden | TelemetryEvent::RestrictedKeyCombo => {
                c.tab_switches += 1;
            }
            TelemetryEvent::MouseLeftTop => {
                c.mouse_leaves += 1;
            }
            TelemetryEvent::Copy | TelemetryEvent::Cut | TelemetryEvent::Paste => {
                c.copy_paste_attempts += 1;
            }
            TelemetryEvent::Keystroke => {
                c.keystrokes += 1;
                c.last_activity_ms = now_ms;
            }
            TelemetryEvent::MouseMove { x, y } => {
                c.trail.push(MouseSample {
                    x: *x,
                    y: *y,
                    ts_ms: now_ms,
                });
                c.last_activity_ms = now_ms;
            }
            TelemetryEvent::Activity => {
                c.last_activity_ms = now_ms;
            }
        }
    }

    /// Total keystrokes observed over the session (never reset).
    pub fn keystrokes(&self) -> u64 {
        self.inner.lock().expect("lock").keystrokes
    }

    /// Atomically snapshot the window into a behavior sample and reset the
    /// violation counters and mouse trail. Returns `None` when nothing
    /// significant happened (all counters zero and idle time below the
    /// threshold) so quiet ticks produce no records. The activity clock is
    /// NOT reset here; only real input events move it.
    pub fn snapshot(&self, now_ms: i64) -> Option<BehaviorSample> {
        let mut c = self.inner.lock().expect("lock");
        let inactivity_ms = (now_ms - c.last_activity_ms).max(0);

        let significant = c.tab_switches > 0
            || c.mouse_leaves > 0
            || c.copy_paste_attempts > 0
            || inactivity_ms >= self.inactivity_threshold_ms;
        if !significant {
            return None;
        }

        let mut sample = BehaviorSample::new();
        sample
            .set(BehaviorFactor::TabSwitch, c.tab_switches as f64)
            .set(BehaviorFactor::MouseLeave, c.mouse_leaves as f64)
            .set(BehaviorFactor::Inactivity, inactivity_ms as f64 / 1000.0)
            .set(BehaviorFactor::RapidMovement, movement_intensity(&c.trail))
            .set(BehaviorFactor::CopyPaste, c.copy_paste_attempts as f64);

        c.tab_switches = 0;
        c.mouse_leaves = 0;
        c.copy_paste_attempts = 0;
        c.trail.clear();

        Some(sample)
    }
}

/// Total euclidean distance of the trail divided by its time span, in
/// pixels per second. Fewer than two points, or a zero span, yields 0.
fn movement_intensity(trail: &[MouseSample]) -> f64 {
    if trail.len() < 2 {
        return 0.0;
    }
    let span_ms = trail[trail.len() - 1].ts_ms - trail[0].ts_ms;
    if span_ms <= 0 {
        return 0.0;
    }

    let mut total_distance = 0.0;
    for pair in trail.windows(2) {
        let dx = pair[1].x - pair[0].x;
        let dy = pair[1].y - pair[0].y;
        total_distance += (dx * dx + dy * dy).sqrt();
    }
    total_distance / (span_ms as f64 / 1000.0)
}

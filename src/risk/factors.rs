//! Behavior factor enumeration and weight/threshold configuration.
//! Factors are a closed set; telemetry cannot introduce unknown kinds.

use serde::{Deserialize, Serialize};

/// One observed behavior dimension of a monitored exam session.
///
/// Serialized names match the wire/record format (`tabSwitch`, `mouseLeave`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BehaviorFactor {
    TabSwitch,
    MouseLeave,
    Inactivity,
    RapidMovement,
    CopyPaste,
}

impl BehaviorFactor {
    pub const ALL: [BehaviorFactor; 5] = [
        BehaviorFactor::TabSwitch,
        BehaviorFactor::MouseLeave,
        BehaviorFactor::Inactivity,
        BehaviorFactor::RapidMovement,
        BehaviorFactor::CopyPaste,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorFactor::TabSwitch => "tabSwitch",
            BehaviorFactor::MouseLeave => "mouseLeave",
            BehaviorFactor::Inactivity => "inactivity",
            BehaviorFactor::RapidMovement => "rapidMovement",
            BehaviorFactor::CopyPaste => "copyPaste",
        }
    }
}

/// Weight and saturation threshold for a single factor.
/// Severity reaches 1.0 once the observed value hits `threshold`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorConfig {
    pub weight: f64,
    pub threshold: f64,
}

/// Per-factor scoring configuration. Weights need not sum to 1.
/// Mutable only through the adaptive weight updater.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorTable {
    pub tab_switch: FactorConfig,
    pub mouse_leave: FactorConfig,
    pub inactivity: FactorConfig,
    pub rapid_movement: FactorConfig,
    pub copy_paste: FactorConfig,
}

impl Default for FactorTable {
    fn default() -> Self {
        Self {
            tab_switch: FactorConfig { weight: 0.3, threshold: 3.0 },
            mouse_leave: FactorConfig { weight: 0.25, threshold: 2.0 },
            // Inactivity threshold in seconds (5 minutes)
            inactivity: FactorConfig { weight: 0.2, threshold: 300.0 },
            // Mouse movement in pixels per second
            rapid_movement: FactorConfig { weight: 0.15, threshold: 10.0 },
            copy_paste: FactorConfig { weight: 0.1, threshold: 1.0 },
        }
    }
}

impl FactorTable {
    pub fn get(&self, factor: BehaviorFactor) -> FactorConfig {
        match factor {
            BehaviorFactor::TabSwitch => self.tab_switch,
            BehaviorFactor::MouseLeave => self.mouse_leave,
            BehaviorFactor::Inactivity => self.inactivity,
            BehaviorFactor::RapidMovement => self.rapid_movement,
            BehaviorFactor::CopyPaste => self.copy_paste,
        }
    }

    pub fn get_mut(&mut self, factor: BehaviorFactor) -> &mut FactorConfig {
        match factor {
            BehaviorFactor::TabSwitch => &mut self.tab_switch,
            BehaviorFactor::MouseLeave => &mut self.mouse_leave,
            BehaviorFactor::Inactivity => &mut self.inactivity,
            BehaviorFactor::RapidMovement => &mut self.rapid_movement,
            BehaviorFactor::CopyPaste => &mut self.copy_paste,
        }
    }
}

/// One assessment's worth of observed factor values (counts or durations).
/// At most one entry per factor; insertion order is preserved in the
/// resulting assessment details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorSample {
    entries: Vec<(BehaviorFactor, f64)>,
}

impl BehaviorSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the observed value for a factor, replacing any previous value.
    pub fn set(&mut self, factor: BehaviorFactor, value: f64) -> &mut Self {
        if let Some(entry) = self.entries.iter_mut().find(|(f, _)| *f == factor) {
            entry.1 = value;
        } else {
            self.entries.push((factor, value));
        }
        self
    }

    pub fn get(&self, factor: BehaviorFactor) -> Option<f64> {
        self.entries.iter().find(|(f, _)| *f == factor).map(|(_, v)| *v)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BehaviorFactor, f64)> + '_ {
        self.entries.iter().copied()
    }
}

//! Rule-engine inputs and decisions.

use geowatch_core::{AlertLevel, ThresholdSource, Thresholds};
use serde::Serialize;

/// Which stage produced the final level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DecisionSource {
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "adaptive")]
    Adaptive,
    #[serde(rename = "persistence")]
    Persistence,
    /// No rule could be evaluated beyond the fixed displacement check.
    #[serde(rename = "none")]
    NoRule,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Adaptive => "adaptive",
            Self::Persistence => "persistence",
            Self::NoRule => "none",
        }
    }
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tick inputs to the rule engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleInput {
    /// Velocity in mm/hr; `None` when undefined (first tick, gaps).
    pub vel_mm_hr: Option<f64>,
    /// Current displacement in mm.
    pub disp_mm: f64,
    /// Displacement accumulated over the persistence window (mm).
    pub accum_mm: Option<f64>,
}

/// Classification of one tick with full provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Final level after persistence elevation.
    pub level: AlertLevel,
    /// Level from fixed and adaptive rules alone.
    pub base_level: AlertLevel,
    pub source: DecisionSource,
    /// Rule that set `level`, e.g. `abs(d)>5 & v>1.5`, `thr_alerta`, `accum_12h>10`.
    pub rule: String,
    /// Rule that set `base_level`.
    pub base_rule: String,
    pub threshold_source: ThresholdSource,
    pub thresholds: Option<Thresholds>,
    /// Persistence raised the level by one.
    pub elevated: bool,
    /// Velocity was undefined, so velocity rules were skipped.
    pub insufficient_data: bool,
}

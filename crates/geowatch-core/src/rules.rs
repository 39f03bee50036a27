//! Velocity thresholds and fixed classification rules.
//!
//! `Thresholds` is immutable once built: the only way to obtain one is through
//! [`Thresholds::new`], which rejects negative, non-finite, or inverted pairs.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// ALERTA/ALARMA velocity thresholds in mm/hr.
///
/// Invariant: `0 <= alerta <= alarma`, both finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct Thresholds {
    alerta: f64,
    alarma: f64,
}

#[derive(Deserialize)]
struct RawThresholds {
    alerta: f64,
    alarma: f64,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = CoreError;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        Self::new(raw.alerta, raw.alarma)
    }
}

impl Thresholds {
    /// Build a validated threshold pair.
    pub fn new(alerta: f64, alarma: f64) -> Result<Self> {
        if !alerta.is_finite() || !alarma.is_finite() {
            return Err(CoreError::InvalidThresholds(format!(
                "thresholds must be finite (alerta={alerta}, alarma={alarma})"
            )));
        }
        if alerta < 0.0 {
            return Err(CoreError::InvalidThresholds(format!(
                "alerta ({alerta}) must be non-negative"
            )));
        }
        if alarma < alerta {
            return Err(CoreError::InvalidThresholds(format!(
                "alarma ({alarma}) must be >= alerta ({alerta})"
            )));
        }
        Ok(Self { alerta, alarma })
    }

    /// ALERTA velocity threshold (mm/hr).
    pub fn alerta(&self) -> f64 {
        self.alerta
    }

    /// ALARMA velocity threshold (mm/hr).
    pub fn alarma(&self) -> f64 {
        self.alarma
    }
}

/// Fixed numeric rules, all in physical units (mm/hr, mm).
///
/// `v_alarm_with_d2 >= v_alarm_with_d1` is expected by the rule precedence
/// but not enforced; see [`FixedRules::combo_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedRules {
    /// Velocity that raises ALERTA (mm/hr).
    #[serde(default = "default_v_alert")]
    pub v_alert: f64,
    /// Velocity that raises ALARMA on its own (mm/hr).
    #[serde(default = "default_v_alarm")]
    pub v_alarm: f64,
    /// Displacement that raises ALERTA and arms the combined rules (mm).
    #[serde(default = "default_d_alert")]
    pub d_alert: f64,
    /// Velocity that raises ALARMA when displacement exceeds `d_alert` (mm/hr).
    #[serde(default = "default_v_alarm_with_d1")]
    pub v_alarm_with_d1: f64,
    /// Second combined velocity limit, checked before `v_alarm_with_d1` (mm/hr).
    #[serde(default = "default_v_alarm_with_d2")]
    pub v_alarm_with_d2: f64,
}

fn default_v_alert() -> f64 {
    1.0
}

fn default_v_alarm() -> f64 {
    3.0
}

fn default_d_alert() -> f64 {
    5.0
}

fn default_v_alarm_with_d1() -> f64 {
    1.5
}

fn default_v_alarm_with_d2() -> f64 {
    2.0
}

impl Default for FixedRules {
    fn default() -> Self {
        Self {
            v_alert: default_v_alert(),
            v_alarm: default_v_alarm(),
            d_alert: default_d_alert(),
            v_alarm_with_d1: default_v_alarm_with_d1(),
            v_alarm_with_d2: default_v_alarm_with_d2(),
        }
    }
}

impl FixedRules {
    /// Validate rule values.
    ///
    /// Returns Err if any value is negative or non-finite, or if
    /// `v_alarm < v_alert`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("v_alert", self.v_alert),
            ("v_alarm", self.v_alarm),
            ("d_alert", self.d_alert),
            ("v_alarm_with_d1", self.v_alarm_with_d1),
            ("v_alarm_with_d2", self.v_alarm_with_d2),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidConfig(format!(
                    "fixed rule {name} ({value}) must be finite and non-negative"
                )));
            }
        }

        if self.v_alarm < self.v_alert {
            return Err(CoreError::InvalidConfig(format!(
                "v_alarm ({}) must be >= v_alert ({})",
                self.v_alarm, self.v_alert
            )));
        }

        Ok(())
    }

    /// Whether the combined limits are in the expected order (d2 >= d1).
    pub fn combo_ordered(&self) -> bool {
        self.v_alarm_with_d2 >= self.v_alarm_with_d1
    }
}

/// Where the thresholds used for a decision came from.
///
/// Rendered as `sliding_<N>h`, `baseline`, or `fixed_only`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ThresholdSource {
    /// Recomputed over the trailing window ending at the evaluated tick.
    Sliding { window_hours: f64 },
    /// Computed once from the leading quiet segment of the series.
    Baseline,
    /// No adaptive thresholds were available; only fixed rules apply.
    FixedOnly,
}

impl ThresholdSource {
    /// Whether adaptive thresholds back this source.
    pub fn is_adaptive(&self) -> bool {
        !matches!(self, Self::FixedOnly)
    }
}

impl std::fmt::Display for ThresholdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sliding { window_hours } if window_hours.fract() == 0.0 => {
                write!(f, "sliding_{}h", *window_hours as i64)
            }
            Self::Sliding { window_hours } => write!(f, "sliding_{window_hours}h"),
            Self::Baseline => f.write_str("baseline"),
            Self::FixedOnly => f.write_str("fixed_only"),
        }
    }
}

impl From<ThresholdSource> for String {
    fn from(source: ThresholdSource) -> Self {
        source.to_string()
    }
}

impl TryFrom<String> for ThresholdSource {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        match value.as_str() {
            "baseline" => Ok(Self::Baseline),
            "fixed_only" => Ok(Self::FixedOnly),
            other => other
                .strip_prefix("sliding_")
                .and_then(|rest| rest.strip_suffix('h'))
                .and_then(|hours| hours.parse::<f64>().ok())
                .map(|window_hours| Self::Sliding { window_hours })
                .ok_or_else(|| CoreError::InvalidConfig(format!("unknown threshold source: {other}"))),
        }
    }
}

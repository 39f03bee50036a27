//! Rule fusion.
//!
//! Precedence, highest first:
//! 1. `|d| > d_alert && |v| > v_alarm_with_d2`  -> ALARMA
//! 2. `|d| > d_alert && |v| > v_alarm_with_d1`  -> ALARMA
//! 3. `|v| > v_alarm`                           -> ALARMA
//! 4. `|v| > v_alert` or `|d| > d_alert`        -> ALERTA
//! 5. `|v| > alarma` / `|v| > alerta` (adaptive) -> ALARMA / ALERTA
//! 6. otherwise NORMAL
//!
//! Then persistence: `|accum| > accum_window_threshold_mm` raises NORMAL or
//! ALERTA by exactly one level. All comparisons are strict.

use crate::config::DetectorConfig;
use crate::decision::{Decision, DecisionSource, RuleInput};
use crate::error::{DetectorError, DetectorResult};
use crate::thresholds::ActiveThresholds;
use geowatch_core::{AlertLevel, FixedRules};
use tracing::{trace, warn};

/// Stateless rule engine.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    fixed: FixedRules,
    accum_window_hours: f64,
    accum_window_threshold_mm: f64,
}

impl RuleEngine {
    /// Create a rule engine; invalid configuration is rejected here.
    pub fn new(config: &DetectorConfig) -> DetectorResult<Self> {
        config
            .validate()
            .map_err(DetectorError::InvalidConfiguration)?;
        if !config.fixed.combo_ordered() {
            warn!(
                v_alarm_with_d1 = config.fixed.v_alarm_with_d1,
                v_alarm_with_d2 = config.fixed.v_alarm_with_d2,
                "Combined velocity limits out of order, the d1 rule is unreachable"
            );
        }
        Ok(Self {
            fixed: config.fixed,
            accum_window_hours: config.accum_window_hours,
            accum_window_threshold_mm: config.accum_window_threshold_mm,
        })
    }

    pub fn fixed_rules(&self) -> &FixedRules {
        &self.fixed
    }

    /// Classify one tick.
    pub fn classify(&self, input: &RuleInput, active: &ActiveThresholds) -> Decision {
        let vel = input
            .vel_mm_hr
            .filter(|v| v.is_finite())
            .map(f64::abs);
        let disp = input.disp_mm.abs();

        let (base_level, base_source, base_rule) = self.base_level(vel, disp, active);

        let accum = input.accum_mm.filter(|a| a.is_finite()).map(f64::abs);
        let persists = accum.is_some_and(|a| a > self.accum_window_threshold_mm);
        let elevated = persists && base_level != AlertLevel::Alarma;

        let (level, source, rule) = if elevated {
            (
                base_level.elevate(),
                DecisionSource::Persistence,
                format!(
                    "accum_{}h>{}",
                    self.accum_window_hours, self.accum_window_threshold_mm
                ),
            )
        } else {
            (base_level, base_source, base_rule.clone())
        };

        trace!(
            level = %level,
            source = %source,
            rule = %rule,
            threshold_source = %active.source,
            "Tick classified"
        );

        Decision {
            level,
            base_level,
            source,
            rule,
            base_rule,
            threshold_source: active.source,
            thresholds: active.thresholds,
            elevated,
            insufficient_data: vel.is_none(),
        }
    }

    fn base_level(
        &self,
        vel: Option<f64>,
        disp: f64,
        active: &ActiveThresholds,
    ) -> (AlertLevel, DecisionSource, String) {
        let f = &self.fixed;
        // NaN displacement never arms a displacement rule
        let disp_over = disp > f.d_alert;

        if let Some(v) = vel {
            if disp_over && v > f.v_alarm_with_d2 {
                return (
                    AlertLevel::Alarma,
                    DecisionSource::Fixed,
                    format!("abs(d)>{} & v>{}", f.d_alert, f.v_alarm_with_d2),
                );
            }
            if disp_over && v > f.v_alarm_with_d1 {
                return (
                    AlertLevel::Alarma,
                    DecisionSource::Fixed,
                    format!("abs(d)>{} & v>{}", f.d_alert, f.v_alarm_with_d1),
                );
            }
            if v > f.v_alarm {
                return (
                    AlertLevel::Alarma,
                    DecisionSource::Fixed,
                    format!("v>{}", f.v_alarm),
                );
            }
            if v > f.v_alert {
                return (
                    AlertLevel::Alerta,
                    DecisionSource::Fixed,
                    format!("v>{}", f.v_alert),
                );
            }
        }
        if disp_over {
            return (
                AlertLevel::Alerta,
                DecisionSource::Fixed,
                format!("abs(d)>{}", f.d_alert),
            );
        }

        match (vel, active.thresholds) {
            (Some(v), Some(thr)) if v > thr.alarma() => (
                AlertLevel::Alarma,
                DecisionSource::Adaptive,
                "thr_alarma".to_string(),
            ),
            (Some(v), Some(thr)) if v > thr.alerta() => (
                AlertLevel::Alerta,
                DecisionSource::Adaptive,
                "thr_alerta".to_string(),
            ),
            (Some(_), Some(_)) => (
                AlertLevel::Normal,
                DecisionSource::Adaptive,
                "none".to_string(),
            ),
            _ => (
                AlertLevel::Normal,
                DecisionSource::NoRule,
                "none".to_string(),
            ),
        }
    }
}

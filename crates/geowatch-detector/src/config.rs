//! Detector configuration.

use geowatch_core::{FixedRules, MAX_WINDOW_HOURS};
use serde::{Deserialize, Serialize};

/// Configuration for threshold estimation and rule fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Fixed numeric rules.
    #[serde(default)]
    pub fixed: FixedRules,
    /// Leading fraction of the series used as the quiet baseline, in (0, 1].
    #[serde(default = "default_baseline_fraction")]
    pub baseline_fraction: f64,
    /// Recompute thresholds over a trailing window at every tick.
    #[serde(default = "default_sliding_enabled")]
    pub sliding_enabled: bool,
    /// Width of the trailing window in hours.
    #[serde(default = "default_sliding_window_hours")]
    pub sliding_window_hours: f64,
    /// Finite samples required inside the trailing window.
    #[serde(default = "default_sliding_min_points")]
    pub sliding_min_points: usize,
    /// Width of the centred rolling median applied to |velocity| before statistics.
    #[serde(default = "default_prefilter_width")]
    pub prefilter_width: usize,
    /// MAD multiplier for ALERTA (applied to the scaled MAD).
    #[serde(default = "default_mad_k_alerta")]
    pub mad_k_alerta: f64,
    /// MAD multiplier for ALARMA.
    #[serde(default = "default_mad_k_alarma")]
    pub mad_k_alarma: f64,
    /// Percentile floor for ALERTA (0-100).
    #[serde(default = "default_percentile_alerta")]
    pub percentile_alerta: f64,
    /// Percentile floor for ALARMA (0-100).
    #[serde(default = "default_percentile_alarma")]
    pub percentile_alarma: f64,
    /// ALARMA is at least this multiple of ALERTA.
    #[serde(default = "default_alarma_floor_ratio")]
    pub alarma_floor_ratio: f64,
    /// Trailing window for accumulated displacement (hours).
    #[serde(default = "default_accum_window_hours")]
    pub accum_window_hours: f64,
    /// Accumulated displacement that elevates the level by one (mm).
    #[serde(default = "default_accum_window_threshold_mm")]
    pub accum_window_threshold_mm: f64,
}

fn default_baseline_fraction() -> f64 {
    0.2
}

fn default_sliding_enabled() -> bool {
    true
}

fn default_sliding_window_hours() -> f64 {
    12.0
}

fn default_sliding_min_points() -> usize {
    30
}

fn default_prefilter_width() -> usize {
    5
}

fn default_mad_k_alerta() -> f64 {
    7.0
}

fn default_mad_k_alarma() -> f64 {
    11.0
}

fn default_percentile_alerta() -> f64 {
    97.5
}

fn default_percentile_alarma() -> f64 {
    99.5
}

fn default_alarma_floor_ratio() -> f64 {
    1.3
}

fn default_accum_window_hours() -> f64 {
    12.0
}

fn default_accum_window_threshold_mm() -> f64 {
    10.0
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fixed: FixedRules::default(),
            baseline_fraction: default_baseline_fraction(),
            sliding_enabled: default_sliding_enabled(),
            sliding_window_hours: default_sliding_window_hours(),
            sliding_min_points: default_sliding_min_points(),
            prefilter_width: default_prefilter_width(),
            mad_k_alerta: default_mad_k_alerta(),
            mad_k_alarma: default_mad_k_alarma(),
            percentile_alerta: default_percentile_alerta(),
            percentile_alarma: default_percentile_alarma(),
            alarma_floor_ratio: default_alarma_floor_ratio(),
            accum_window_hours: default_accum_window_hours(),
            accum_window_threshold_mm: default_accum_window_threshold_mm(),
        }
    }
}

impl DetectorConfig {
    /// Validate configuration values.
    ///
    /// Returns Err if:
    /// - any fixed rule is negative or v_alarm < v_alert
    /// - baseline_fraction is outside (0, 1]
    /// - sliding_window_hours <= 0 or sliding_min_points == 0 while sliding is enabled
    /// - a MAD multiplier is negative, or mad_k_alarma < mad_k_alerta
    /// - a percentile is outside [0, 100], or percentile_alarma < percentile_alerta
    /// - alarma_floor_ratio <= 1
    /// - a window length is not in (0, MAX_WINDOW_HOURS], or accum_window_threshold_mm < 0
    pub fn validate(&self) -> Result<(), String> {
        self.fixed.validate().map_err(|e| e.to_string())?;

        if !(self.baseline_fraction > 0.0 && self.baseline_fraction <= 1.0) {
            return Err(format!(
                "baseline_fraction ({}) must be in (0, 1]",
                self.baseline_fraction
            ));
        }

        if self.sliding_enabled {
            check_window_hours("sliding_window_hours", self.sliding_window_hours)?;
            if self.sliding_min_points == 0 {
                return Err("sliding_min_points must be at least 1".to_string());
            }
        }

        for (name, k) in [
            ("mad_k_alerta", self.mad_k_alerta),
            ("mad_k_alarma", self.mad_k_alarma),
        ] {
            if !k.is_finite() || k < 0.0 {
                return Err(format!("{name} ({k}) must be non-negative"));
            }
        }
        if self.mad_k_alarma < self.mad_k_alerta {
            return Err(format!(
                "mad_k_alarma ({}) must be >= mad_k_alerta ({})",
                self.mad_k_alarma, self.mad_k_alerta
            ));
        }

        for (name, p) in [
            ("percentile_alerta", self.percentile_alerta),
            ("percentile_alarma", self.percentile_alarma),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(format!("{name} ({p}) must be in [0, 100]"));
            }
        }
        if self.percentile_alarma < self.percentile_alerta {
            return Err(format!(
                "percentile_alarma ({}) must be >= percentile_alerta ({})",
                self.percentile_alarma, self.percentile_alerta
            ));
        }

        if !self.alarma_floor_ratio.is_finite() || self.alarma_floor_ratio <= 1.0 {
            return Err(format!(
                "alarma_floor_ratio ({}) must be > 1",
                self.alarma_floor_ratio
            ));
        }

        check_window_hours("accum_window_hours", self.accum_window_hours)?;
        if !self.accum_window_threshold_mm.is_finite() || self.accum_window_threshold_mm < 0.0 {
            return Err(format!(
                "accum_window_threshold_mm ({}) must be non-negative",
                self.accum_window_threshold_mm
            ));
        }

        Ok(())
    }
}

/// Window length in `(0, MAX_WINDOW_HOURS]`.
pub fn check_window_hours(name: &str, hours: f64) -> Result<(), String> {
    if !hours.is_finite() || hours <= 0.0 {
        return Err(format!("{name} ({hours}) must be positive"));
    }
    if hours > MAX_WINDOW_HOURS {
        return Err(format!("{name} ({hours}) exceeds {MAX_WINDOW_HOURS} hours"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fixed.v_alert, 1.0);
        assert_eq!(config.sliding_min_points, 30);
        assert_eq!(config.accum_window_threshold_mm, 10.0);
    }

    #[test]
    fn test_validate_baseline_fraction() {
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let config = DetectorConfig {
                baseline_fraction: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "fraction {bad} accepted");
        }
        let config = DetectorConfig {
            baseline_fraction: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_fixed_rules() {
        let mut config = DetectorConfig::default();
        config.fixed.v_alarm = 0.5;
        let err = config.validate().unwrap_err();
        assert!(err.contains("v_alarm"));
    }

    #[test]
    fn test_validate_sliding_only_when_enabled() {
        let mut config = DetectorConfig {
            sliding_window_hours: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.sliding_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_percentiles_and_ratio() {
        let config = DetectorConfig {
            percentile_alarma: 90.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        for ratio in [0.9, 1.0] {
            let config = DetectorConfig {
                alarma_floor_ratio: ratio,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "ratio {ratio} accepted");
        }
    }

    #[test]
    fn test_validate_rejects_huge_windows() {
        let config = DetectorConfig {
            sliding_window_hours: 1e15,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("sliding_window_hours"));

        let config = DetectorConfig {
            accum_window_hours: MAX_WINDOW_HOURS + 1.0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("accum_window_hours"));

        let config = DetectorConfig {
            sliding_window_hours: MAX_WINDOW_HOURS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"baseline_fraction":0.3,"fixed":{"v_alert":0.8}}"#).unwrap();
        assert_eq!(config.baseline_fraction, 0.3);
        assert_eq!(config.fixed.v_alert, 0.8);
        assert_eq!(config.fixed.v_alarm, 3.0);
        assert_eq!(config.sliding_window_hours, 12.0);
    }
}

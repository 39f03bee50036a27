//! Precomputed indicators for one displacement series.
//!
//! `IndicatorSet` is built once per series update and then only read; every
//! per-tick accessor is a pure lookup or a bounded window computation.

use crate::ema::{ema, span_points};
use crate::inverse_velocity::inverse_velocity_index;
use crate::kinematics::{acceleration_mm_hr2, velocity_mm_hr};
use crate::stats::prefix_percentiles;
use geowatch_core::Series;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Indicator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// EMA horizons in hours, converted to spans via the series interval.
    #[serde(default = "default_ema_hours")]
    pub ema_hours: Vec<f64>,
    /// Bollinger multiplier k.
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,
    /// Trailing points fed to the inverse-velocity index.
    #[serde(default = "default_iv_window_points")]
    pub iv_window_points: usize,
    /// Usable samples required for the inverse-velocity index.
    #[serde(default = "default_iv_min_points")]
    pub iv_min_points: usize,
}

fn default_ema_hours() -> Vec<f64> {
    vec![1.0, 3.0, 12.0]
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_iv_window_points() -> usize {
    30
}

fn default_iv_min_points() -> usize {
    5
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_hours: default_ema_hours(),
            bollinger_k: default_bollinger_k(),
            iv_window_points: default_iv_window_points(),
            iv_min_points: default_iv_min_points(),
        }
    }
}

impl IndicatorConfig {
    /// Validate indicator parameters.
    ///
    /// Returns Err if:
    /// - no EMA horizon is configured, or one is not a positive finite number
    /// - bollinger_k <= 0
    /// - iv_min_points < 2 or iv_window_points < iv_min_points
    pub fn validate(&self) -> Result<(), String> {
        if self.ema_hours.is_empty() {
            return Err("ema_hours must contain at least one horizon".to_string());
        }
        if let Some(bad) = self
            .ema_hours
            .iter()
            .find(|h| !h.is_finite() || **h <= 0.0)
        {
            return Err(format!("ema horizon ({bad}) must be positive"));
        }
        if !self.bollinger_k.is_finite() || self.bollinger_k <= 0.0 {
            return Err(format!(
                "bollinger_k ({}) must be positive",
                self.bollinger_k
            ));
        }
        if self.iv_min_points < 2 {
            return Err(format!(
                "iv_min_points ({}) must be at least 2",
                self.iv_min_points
            ));
        }
        if self.iv_window_points < self.iv_min_points {
            return Err(format!(
                "iv_window_points ({}) must be >= iv_min_points ({})",
                self.iv_window_points, self.iv_min_points
            ));
        }
        Ok(())
    }
}

/// One EMA horizon computed over the full series.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaTrack {
    pub hours: f64,
    pub span: usize,
    /// `None` when the series has no finite displacement.
    pub values: Option<Vec<f64>>,
}

/// EMA value at a single index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaValue {
    pub hours: f64,
    pub span: usize,
    /// `None` means insufficient data, never zero.
    pub value: Option<f64>,
}

/// Velocity, acceleration, and EMAs aligned with a series.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    series: Series,
    velocity: Vec<f64>,
    acceleration: Vec<f64>,
    emas: Vec<EmaTrack>,
    abs_vel_p95: Vec<Option<f64>>,
    abs_vel_p99: Vec<Option<f64>>,
    config: IndicatorConfig,
}

impl IndicatorSet {
    /// Compute all indicators for `series`.
    pub fn compute(series: Series, config: &IndicatorConfig) -> Self {
        let times = series.times();
        let disp = series.values();
        let velocity = velocity_mm_hr(&times, &disp);
        let acceleration = acceleration_mm_hr2(&times, &velocity);

        let emas = config
            .ema_hours
            .iter()
            .map(|&hours| {
                let span = series
                    .interval()
                    .map(|interval| span_points(hours, interval))
                    .unwrap_or(1);
                EmaTrack {
                    hours,
                    span,
                    values: ema(&disp, span),
                }
            })
            .collect::<Vec<_>>();

        let abs_vel: Vec<f64> = velocity.iter().map(|v| v.abs()).collect();
        let abs_vel_p95 = prefix_percentiles(&abs_vel, 95.0);
        let abs_vel_p99 = prefix_percentiles(&abs_vel, 99.0);

        debug!(
            points = series.len(),
            spans = ?emas.iter().map(|e| e.span).collect::<Vec<_>>(),
            "Indicators computed"
        );

        Self {
            series,
            velocity,
            acceleration,
            emas,
            abs_vel_p95,
            abs_vel_p99,
            config: config.clone(),
        }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Full velocity series (mm/hr); index 0 is NaN.
    pub fn velocity(&self) -> &[f64] {
        &self.velocity
    }

    /// Full acceleration series (mm/hr²); indices 0 and 1 are NaN.
    pub fn acceleration(&self) -> &[f64] {
        &self.acceleration
    }

    pub fn emas(&self) -> &[EmaTrack] {
        &self.emas
    }

    /// Finite velocity at `index`, if any.
    pub fn velocity_at(&self, index: usize) -> Option<f64> {
        self.velocity.get(index).copied().filter(|v| v.is_finite())
    }

    /// Finite acceleration at `index`, if any.
    pub fn acceleration_at(&self, index: usize) -> Option<f64> {
        self.acceleration.get(index).copied().filter(|v| v.is_finite())
    }

    /// EMA values for every configured horizon at `index`.
    pub fn ema_at(&self, index: usize) -> Vec<EmaValue> {
        self.emas
            .iter()
            .map(|track| EmaValue {
                hours: track.hours,
                span: track.span,
                value: track
                    .values
                    .as_ref()
                    .and_then(|v| v.get(index).copied())
                    .filter(|v| v.is_finite()),
            })
            .collect()
    }

    /// P95 and P99 of |velocity| over `[0, index]`.
    pub fn abs_vel_percentiles_to(&self, index: usize) -> (Option<f64>, Option<f64>) {
        (
            self.abs_vel_p95.get(index).copied().flatten(),
            self.abs_vel_p99.get(index).copied().flatten(),
        )
    }

    /// Inverse-velocity index over the trailing window ending at `index`.
    pub fn inverse_velocity_at(&self, index: usize) -> Option<f64> {
        if index >= self.len() {
            return None;
        }
        let start = (index + 1).saturating_sub(self.config.iv_window_points);
        let times: Vec<_> = self.series.points()[start..=index]
            .iter()
            .map(|p| p.time)
            .collect();
        inverse_velocity_index(
            &times,
            &self.velocity[start..=index],
            self.config.iv_min_points,
        )
    }

    /// Displacement accumulated over the trailing `hours` ending at `index`.
    pub fn accumulation(&self, index: usize, hours: f64) -> Option<f64> {
        let end = self.series.get(index)?;
        let start = self.series.get(self.series.window_start(index, hours))?;
        let delta = end.disp_mm - start.disp_mm;
        delta.is_finite().then_some(delta)
    }
}

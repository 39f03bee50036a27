//! Adaptive ALERTA/ALARMA velocity thresholds.
//!
//! Two strategies share one robust formula over a pre-filtered |velocity|
//! sample:
//!
//! ```text
//! sigma  = 1.4826 * MAD
//! alerta = max(median + k_alerta * sigma, P_alerta)
//! alarma = max(median + k_alarma * sigma, P_alarma, ratio * alerta)
//! ```
//!
//! The baseline strategy samples the leading quiet segment of the series;
//! the sliding strategy samples `[t - w, t]`. A zero MAD is treated as
//! degenerate in both cases.

use crate::config::DetectorConfig;
use crate::error::{DetectorError, DetectorResult};
use geowatch_core::{Series, ThresholdSource, Thresholds};
use geowatch_indicators::{mad, median, percentile, rolling_median, MAD_SCALE};
use serde::Serialize;
use tracing::debug;

/// Fewest finite samples the robust formula accepts.
const MIN_SAMPLE_POINTS: usize = 2;

/// Adaptive threshold strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Baseline,
    Sliding,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Sliding => "sliding",
        }
    }
}

/// A strategy that could not produce thresholds for a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Unavailable {
    pub strategy: Strategy,
    pub error: DetectorError,
}

/// Thresholds chosen for one tick, with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveThresholds {
    /// `None` only when the source is `FixedOnly`.
    pub thresholds: Option<Thresholds>,
    pub source: ThresholdSource,
    /// Strategies skipped on the way to `source`, highest precedence first.
    pub unavailable: Vec<Unavailable>,
}

impl ActiveThresholds {
    pub fn fixed_only() -> Self {
        Self {
            thresholds: None,
            source: ThresholdSource::FixedOnly,
            unavailable: Vec::new(),
        }
    }
}

/// Robust threshold estimator.
#[derive(Debug, Clone)]
pub struct ThresholdEstimator {
    config: DetectorConfig,
}

impl ThresholdEstimator {
    /// Create an estimator; invalid configuration is rejected here.
    pub fn new(config: DetectorConfig) -> DetectorResult<Self> {
        config
            .validate()
            .map_err(DetectorError::InvalidConfiguration)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Apply the robust formula to an already pre-filtered sample.
    pub fn from_sample(&self, sample: &[f64]) -> DetectorResult<Thresholds> {
        let have = sample.iter().filter(|v| v.is_finite()).count();
        if have < MIN_SAMPLE_POINTS {
            return Err(DetectorError::InsufficientData {
                have,
                need: MIN_SAMPLE_POINTS,
            });
        }

        let (Some(med), Some(raw_mad)) = (median(sample), mad(sample)) else {
            return Err(DetectorError::InsufficientData {
                have,
                need: MIN_SAMPLE_POINTS,
            });
        };
        if raw_mad <= 0.0 || !raw_mad.is_finite() {
            return Err(DetectorError::DegenerateStatistics { mad: raw_mad });
        }

        let sigma = MAD_SCALE * raw_mad;
        let p_alerta = percentile(sample, self.config.percentile_alerta).unwrap_or(med);
        let p_alarma = percentile(sample, self.config.percentile_alarma).unwrap_or(med);

        let alerta = (med + self.config.mad_k_alerta * sigma).max(p_alerta);
        let alarma = (med + self.config.mad_k_alarma * sigma)
            .max(p_alarma)
            .max(self.config.alarma_floor_ratio * alerta);

        Ok(Thresholds::new(alerta, alarma)?)
    }

    /// Thresholds from the leading `baseline_fraction` of `abs_vel`.
    ///
    /// The rolling-median pre-filter runs over the whole series before the
    /// baseline slice is taken, so the slice edge sees its right neighbours.
    pub fn baseline(&self, abs_vel: &[f64]) -> DetectorResult<Thresholds> {
        let n = abs_vel.len();
        if n == 0 {
            return Err(DetectorError::InsufficientData {
                have: 0,
                need: MIN_SAMPLE_POINTS,
            });
        }
        let end = ((n as f64 * self.config.baseline_fraction) as usize).clamp(1, n);
        let filtered = rolling_median(abs_vel, self.config.prefilter_width);

        let result = self.from_sample(&filtered[..end]);
        match &result {
            Ok(thr) => debug!(
                points = end,
                alerta = thr.alerta(),
                alarma = thr.alarma(),
                "Baseline thresholds computed"
            ),
            Err(e) => debug!(points = end, error = %e, "Baseline thresholds unavailable"),
        }
        result
    }

    /// Thresholds over `[t(index) - sliding_window_hours, t(index)]`.
    pub fn sliding(
        &self,
        series: &Series,
        abs_vel: &[f64],
        index: usize,
    ) -> DetectorResult<Thresholds> {
        if index >= series.len() || index >= abs_vel.len() {
            return Err(DetectorError::InsufficientData {
                have: 0,
                need: self.config.sliding_min_points,
            });
        }
        let start = series.window_start(index, self.config.sliding_window_hours);
        let window: Vec<f64> = abs_vel[start..=index]
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if window.len() < self.config.sliding_min_points {
            return Err(DetectorError::InsufficientData {
                have: window.len(),
                need: self.config.sliding_min_points,
            });
        }

        let filtered = rolling_median(&window, self.config.prefilter_width);
        self.from_sample(&filtered)
    }

    /// Pick the thresholds for one tick.
    ///
    /// Precedence: sliding, then baseline, then fixed rules only.
    /// `sliding` is `None` when the sliding strategy is disabled.
    pub fn resolve(
        &self,
        sliding: Option<DetectorResult<Thresholds>>,
        baseline: &DetectorResult<Thresholds>,
    ) -> ActiveThresholds {
        let mut unavailable = Vec::new();

        if let Some(result) = sliding {
            match result {
                Ok(thresholds) => {
                    return ActiveThresholds {
                        thresholds: Some(thresholds),
                        source: ThresholdSource::Sliding {
                            window_hours: self.config.sliding_window_hours,
                        },
                        unavailable,
                    }
                }
                Err(error) => unavailable.push(Unavailable {
                    strategy: Strategy::Sliding,
                    error,
                }),
            }
        }

        match baseline {
            Ok(thresholds) => ActiveThresholds {
                thresholds: Some(*thresholds),
                source: ThresholdSource::Baseline,
                unavailable,
            },
            Err(error) => {
                unavailable.push(Unavailable {
                    strategy: Strategy::Baseline,
                    error: error.clone(),
                });
                ActiveThresholds {
                    thresholds: None,
                    source: ThresholdSource::FixedOnly,
                    unavailable,
                }
            }
        }
    }

    /// Sliding (if enabled) plus resolution for `index`.
    pub fn resolve_at(
        &self,
        series: &Series,
        abs_vel: &[f64],
        index: usize,
        baseline: &DetectorResult<Thresholds>,
    ) -> ActiveThresholds {
        let sliding = self
            .config
            .sliding_enabled
            .then(|| self.sliding(series, abs_vel, index));
        self.resolve(sliding, baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use geowatch_core::SeriesPoint;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn grid(n: usize, step_min: i64) -> Series {
        Series::new(
            (0..n)
                .map(|i| SeriesPoint::new(t(step_min * i as i64), 0.0))
                .collect(),
        )
        .unwrap()
    }

    /// Deterministic noisy |velocity| sample around 0.2 mm/hr.
    fn noisy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 0.2 + 0.05 * (((i * 7) % 11) as f64 / 10.0 - 0.5))
            .collect()
    }

    fn estimator() -> ThresholdEstimator {
        ThresholdEstimator::new(DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DetectorConfig {
            baseline_fraction: 0.0,
            ..Default::default()
        };
        let err = ThresholdEstimator::new(config).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidConfiguration(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_from_sample_formula() {
        // median 3, MAD 1 -> sigma 1.4826
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        let thr = estimator().from_sample(&sample).unwrap();

        let expected_alerta = 3.0 + 7.0 * MAD_SCALE;
        let expected_alarma = (3.0 + 11.0 * MAD_SCALE).max(1.3 * expected_alerta);
        assert!((thr.alerta() - expected_alerta).abs() < 1e-9);
        assert!((thr.alarma() - expected_alarma).abs() < 1e-9);
        assert!(thr.alarma() >= thr.alerta());
    }

    #[test]
    fn test_percentile_floor_dominates_small_mad() {
        let config = DetectorConfig {
            mad_k_alerta: 0.0,
            mad_k_alarma: 0.0,
            ..Default::default()
        };
        let est = ThresholdEstimator::new(config).unwrap();
        let sample = [1.0, 2.0, 3.0, 4.0, 5.0];
        let thr = est.from_sample(&sample).unwrap();
        // P97.5 with linear interpolation: rank 3.9 -> 4.9
        assert!((thr.alerta() - 4.9).abs() < 1e-9);
        assert!((thr.alarma() - 1.3 * 4.9).abs() < 1e-9);
    }

    #[test]
    fn test_zero_mad_is_degenerate() {
        let err = estimator().from_sample(&[0.5; 40]).unwrap_err();
        assert_eq!(err, DetectorError::DegenerateStatistics { mad: 0.0 });
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_baseline_uses_leading_fraction() {
        // Quiet first 20%, violent afterwards: baseline must ignore the tail.
        let mut abs_vel = noisy(100);
        for v in abs_vel.iter_mut().skip(30) {
            *v = 50.0;
        }
        let thr = estimator().baseline(&abs_vel).unwrap();
        assert!(thr.alerta() < 1.0);
    }

    #[test]
    fn test_baseline_flat_sample_unavailable() {
        let mut abs_vel = vec![0.1; 100];
        abs_vel[0] = f64::NAN;
        let err = estimator().baseline(&abs_vel).unwrap_err();
        assert!(matches!(err, DetectorError::DegenerateStatistics { .. }));
        assert!(estimator().baseline(&[]).is_err());
    }

    #[test]
    fn test_sliding_requires_min_points() {
        // 2-minute grid: 12h window holds up to 361 points
        let series = grid(20, 2);
        let err = estimator()
            .sliding(&series, &noisy(20), 19)
            .unwrap_err();
        assert_eq!(err, DetectorError::InsufficientData { have: 20, need: 30 });
    }

    #[test]
    fn test_sliding_window_is_time_bounded() {
        // 1h grid: only 13 points fit in 12h even though 100 exist
        let series = grid(100, 60);
        let err = estimator()
            .sliding(&series, &noisy(100), 99)
            .unwrap_err();
        assert_eq!(err, DetectorError::InsufficientData { have: 13, need: 30 });
    }

    #[test]
    fn test_sliding_available() {
        let series = grid(60, 2);
        let thr = estimator().sliding(&series, &noisy(60), 59).unwrap();
        assert!(thr.alerta() > 0.0);
    }

    #[test]
    fn test_resolve_precedence() {
        let est = estimator();
        let sliding_thr = Thresholds::new(1.0, 2.0).unwrap();
        let baseline_thr = Thresholds::new(0.5, 0.9).unwrap();

        let active = est.resolve(Some(Ok(sliding_thr)), &Ok(baseline_thr));
        assert_eq!(active.source, ThresholdSource::Sliding { window_hours: 12.0 });
        assert_eq!(active.thresholds, Some(sliding_thr));
        assert!(active.unavailable.is_empty());

        let active = est.resolve(
            Some(Err(DetectorError::InsufficientData { have: 3, need: 30 })),
            &Ok(baseline_thr),
        );
        assert_eq!(active.source, ThresholdSource::Baseline);
        assert_eq!(active.thresholds, Some(baseline_thr));
        assert_eq!(active.unavailable.len(), 1);
        assert_eq!(active.unavailable[0].strategy, Strategy::Sliding);

        let active = est.resolve(None, &Err(DetectorError::DegenerateStatistics { mad: 0.0 }));
        assert_eq!(active.source, ThresholdSource::FixedOnly);
        assert!(active.thresholds.is_none());
        assert_eq!(active.unavailable[0].strategy, Strategy::Baseline);
    }
}

//! Synthetic displacement series.

use chrono::{DateTime, Duration, TimeZone, Utc};
use geowatch_core::{Series, SeriesPoint};
use geowatch_monitor::AppConfig;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()
}

/// Series from per-step displacement increments, starting at `start_mm`.
pub fn from_increments(step_minutes: i64, start_mm: f64, increments: &[f64]) -> Series {
    let mut disp = start_mm;
    let mut points = vec![SeriesPoint::new(t0(), disp)];
    for (i, inc) in increments.iter().enumerate() {
        disp += inc;
        points.push(SeriesPoint::new(
            t0() + Duration::minutes(step_minutes * (i as i64 + 1)),
            disp,
        ));
    }
    Series::new(points).unwrap()
}

/// Constant-velocity series on a 30-minute grid.
///
/// Increments are exact binary fractions, so every velocity is identical
/// and the robust spread of |velocity| is exactly zero.
pub fn constant_velocity(n: usize, increment_mm: f64) -> Series {
    from_increments(30, 0.0, &vec![increment_mm; n - 1])
}

/// Creep with small deterministic noise on a 2-minute grid, around
/// 0.12 mm/hr.
pub fn noisy_creep(n: usize, start_mm: f64) -> Series {
    let increments: Vec<f64> = (1..n)
        .map(|i| 0.004 + 0.003 * (((i * 7) % 11) as f64 / 10.0 - 0.5))
        .collect();
    from_increments(2, start_mm, &increments)
}

/// Noisy creep with a burst of fast movement in the middle, then quiet.
pub fn creep_with_burst(n: usize, burst: std::ops::Range<usize>, burst_mm_hr: f64) -> Series {
    let increments: Vec<f64> = (1..n)
        .map(|i| {
            if burst.contains(&i) {
                burst_mm_hr / 30.0
            } else {
                0.004 + 0.003 * (((i * 7) % 11) as f64 / 10.0 - 0.5)
            }
        })
        .collect();
    from_increments(2, 0.0, &increments)
}

/// Default configuration with a unique site label.
pub fn config(site: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.site.name = site.to_string();
    config
}

/// Configuration for the 30-minute constant-velocity series.
pub fn config_30min(site: &str) -> AppConfig {
    let mut config = config(site);
    config.series.resample_minutes = 30;
    config.detector.fixed.d_alert = 500.0;
    config
}

//! Inverse-velocity (Fukuzono) creep index.
//!
//! Accelerating creep shows up as 1/|v| falling linearly toward zero. The
//! index is the R² of a least-squares line through (t, 1/|v|) when that line
//! slopes down, and 0 otherwise, so it always lies in [0, 1].

use chrono::{DateTime, Utc};

/// Speeds at or below this are treated as "no motion" and skipped (mm/hr).
const MIN_SPEED_MM_HR: f64 = 1e-6;

/// Compute the index over aligned `times` / `vel_mm_hr` slices.
///
/// Returns `None` when fewer than `min_points` usable samples remain after
/// dropping non-finite and near-zero velocities.
pub fn inverse_velocity_index(
    times: &[DateTime<Utc>],
    vel_mm_hr: &[f64],
    min_points: usize,
) -> Option<f64> {
    let origin = *times.first()?;
    let samples: Vec<(f64, f64)> = times
        .iter()
        .zip(vel_mm_hr)
        .filter(|(_, v)| v.is_finite() && v.abs() > MIN_SPEED_MM_HR)
        .map(|(t, v)| {
            let hours = (*t - origin).num_milliseconds() as f64 / 3_600_000.0;
            (hours, 1.0 / v.abs())
        })
        .collect();

    if samples.len() < min_points.max(2) {
        return None;
    }

    let n = samples.len() as f64;
    let mean_t = samples.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (t, y) in &samples {
        sxy += (t - mean_t) * (y - mean_y);
        sxx += (t - mean_t).powi(2);
        syy += (y - mean_y).powi(2);
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return Some(0.0);
    }

    let slope = sxy / sxx;
    if slope >= 0.0 {
        return Some(0.0);
    }

    let r2 = (sxy * sxy) / (sxx * syy);
    Some(r2.clamp(0.0, 1.0))
}

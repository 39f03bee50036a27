//! Finite-difference velocity and acceleration.
//!
//! Both derivatives are backward differences over the actual timestamp
//! spacing, so a resampled series gives the resample interval. The first
//! velocity sample (and the first two acceleration samples) are NaN: there
//! is no previous point to difference against.

use chrono::{DateTime, Utc};

fn dt_hours(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 3_600_000.0
}

fn backward_rate(times: &[DateTime<Utc>], values: &[f64]) -> Vec<f64> {
    let n = times.len().min(values.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if i == 0 {
            out.push(f64::NAN);
            continue;
        }
        let dt = dt_hours(times[i - 1], times[i]);
        if dt <= 0.0 {
            out.push(f64::NAN);
        } else {
            out.push((values[i] - values[i - 1]) / dt);
        }
    }
    out
}

/// Velocity in mm/hr, aligned index-for-index with the displacement series.
pub fn velocity_mm_hr(times: &[DateTime<Utc>], disp_mm: &[f64]) -> Vec<f64> {
    backward_rate(times, disp_mm)
}

/// Acceleration in mm/hr², aligned index-for-index with the velocity series.
pub fn acceleration_mm_hr2(times: &[DateTime<Utc>], vel_mm_hr: &[f64]) -> Vec<f64> {
    backward_rate(times, vel_mm_hr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn grid(n: usize, step_min: i64) -> Vec<DateTime<Utc>> {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| t0 + Duration::minutes(step_min * i as i64))
            .collect()
    }

    #[test]
    fn test_velocity_scaled_to_hours() {
        // 0.1 mm every 2 minutes = 3 mm/hr
        let times = grid(4, 2);
        let disp = [0.0, 0.1, 0.2, 0.3];
        let vel = velocity_mm_hr(&times, &disp);

        assert!(vel[0].is_nan());
        for v in &vel[1..] {
            assert!((v - 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_acceleration_of_constant_velocity_is_zero() {
        let times = grid(5, 60);
        let disp = [0.0, 1.0, 2.0, 3.0, 4.0];
        let vel = velocity_mm_hr(&times, &disp);
        let acc = acceleration_mm_hr2(&times, &vel);

        assert!(acc[0].is_nan());
        assert!(acc[1].is_nan());
        for a in &acc[2..] {
            assert!(a.abs() < 1e-12);
        }
    }

    #[test]
    fn test_negative_displacement_gives_negative_velocity() {
        let times = grid(2, 60);
        let vel = velocity_mm_hr(&times, &[5.0, 3.0]);
        assert!((vel[1] + 2.0).abs() < 1e-12);
    }
}

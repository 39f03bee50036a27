//! Exponential moving average.

use chrono::Duration;

/// Convert a wall-clock horizon into an EMA span in points.
///
/// Never returns less than 1.
pub fn span_points(hours: f64, interval: Duration) -> usize {
    let interval_hours = interval.num_milliseconds() as f64 / 3_600_000.0;
    if interval_hours <= 0.0 || !hours.is_finite() || hours <= 0.0 {
        return 1;
    }
    ((hours / interval_hours).round() as usize).max(1)
}

/// EMA with smoothing factor α = 2 / (span + 1).
///
/// Seeded with the first finite observation (no simple-average warm-up).
/// Non-finite inputs before the seed produce NaN; after the seed they carry
/// the previous value forward. Returns `None` for `span == 0` or when the
/// input holds no finite value.
pub fn ema(values: &[f64], span: usize) -> Option<Vec<f64>> {
    if span == 0 {
        return None;
    }
    let alpha = 2.0 / (span as f64 + 1.0);

    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &x in values {
        let next = match (prev, x.is_finite()) {
            (None, true) => Some(x),
            (None, false) => None,
            (Some(p), true) => Some(alpha * x + (1.0 - alpha) * p),
            (Some(p), false) => Some(p),
        };
        out.push(next.unwrap_or(f64::NAN));
        prev = next;
    }

    prev.map(|_| out)
}

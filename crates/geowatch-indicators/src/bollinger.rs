//! Bollinger-style volatility envelopes.
//!
//! Secondary signal only: nothing in the rule engine triggers on a band.

use crate::stats::{mean, std_population};
use serde::{Deserialize, Serialize};

/// Fewest finite samples for which a band is defined.
pub const MIN_BAND_POINTS: usize = 2;

/// Mean ± k·std envelope evaluated at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBand {
    pub center: f64,
    pub std: f64,
    pub upper: f64,
    pub lower: f64,
    pub k: f64,
    /// Position of the current value inside the band (0 = lower, 1 = upper).
    pub pos_pct: f64,
}

/// Band over `window` (population std), with `current` placed inside it.
///
/// `None` when the window has fewer than [`MIN_BAND_POINTS`] finite values.
pub fn bands(window: &[f64], current: f64, k: f64) -> Option<BollingerBand> {
    let finite = window.iter().filter(|v| v.is_finite()).count();
    if finite < MIN_BAND_POINTS {
        return None;
    }
    let center = mean(window)?;
    let std = std_population(window)?;
    let upper = center + k * std;
    let lower = center - k * std;
    let pos_pct = (current - lower) / (upper - lower).max(1e-12);
    Some(BollingerBand {
        center,
        std,
        upper,
        lower,
        k,
        pos_pct,
    })
}

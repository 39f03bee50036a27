//! Indicator engine for displacement series.
//!
//! Everything here is a pure function over immutable slices:
//! - `kinematics`: velocity (mm/hr) and acceleration (mm/hr²) by backward difference
//! - `ema`: exponential moving average seeded with the first observation
//! - `bollinger`: mean ± k·std envelopes with position-in-band
//! - `inverse_velocity`: Fukuzono-style creep index bounded to [0, 1]
//! - `stats`: median, MAD, linear-interpolated percentiles, rolling median
//! - `engine`: precomputed `IndicatorSet` for one series

pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod inverse_velocity;
pub mod kinematics;
pub mod stats;

pub use bollinger::{bands, BollingerBand};
pub use ema::{ema, span_points};
pub use engine::{EmaTrack, EmaValue, IndicatorConfig, IndicatorSet};
pub use inverse_velocity::inverse_velocity_index;
pub use kinematics::{acceleration_mm_hr2, velocity_mm_hr};
pub use stats::{
    mad, mean, median, percentile, prefix_percentiles, rolling_median, std_population, MAD_SCALE,
};

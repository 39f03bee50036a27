//! Core domain types for the geowatch slope monitor.
//!
//! This crate provides the typed records shared by every stage of the
//! classification pipeline:
//! - `AlertLevel`: NORMAL / ALERTA / ALARMA
//! - `Series`, `SeriesPoint`: time-ordered displacement samples
//! - `Thresholds`, `FixedRules`: validated velocity/displacement limits
//! - `ThresholdSource`: provenance of the thresholds used for a decision

pub mod error;
pub mod level;
pub mod rules;
pub mod series;

pub use error::{CoreError, Result};
pub use level::AlertLevel;
pub use rules::{FixedRules, ThresholdSource, Thresholds};
pub use series::{hours_to_duration, Series, SeriesPoint, MAX_WINDOW_HOURS};

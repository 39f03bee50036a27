//! Threshold estimation and rule fusion for geowatch.
//!
//! Classifies one tick into NORMAL / ALERTA / ALARMA from:
//! - fixed numeric rules (highest precedence)
//! - adaptive velocity thresholds (sliding window, then baseline)
//! - persistence elevation on 12h accumulated displacement
//!
//! Both stages are pure: identical inputs give identical decisions.

pub mod config;
pub mod decision;
pub mod error;
pub mod rules;
pub mod thresholds;

pub use config::{check_window_hours, DetectorConfig};
pub use decision::{Decision, DecisionSource, RuleInput};
pub use error::{DetectorError, DetectorResult};
pub use rules::RuleEngine;
pub use thresholds::{ActiveThresholds, Strategy, ThresholdEstimator, Unavailable};

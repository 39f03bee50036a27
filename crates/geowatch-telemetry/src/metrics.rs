//! Prometheus metrics for the geowatch monitor.
//!
//! Every series carries a `site` label; one process may run several
//! independent pipelines.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a fatal startup error. These panics
//! only occur during static initialization, never at runtime.

use crate::error::{TelemetryError, TelemetryResult};
use geowatch_core::{AlertLevel, ThresholdSource};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

/// Classified ticks by level.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geowatch_ticks_total",
        "Total classified ticks by alert level",
        &["site", "level"]
    )
    .unwrap()
});

/// Threshold source used per tick.
/// Labels: source (sliding_<N>h/baseline/fixed_only)
pub static THRESHOLD_SOURCE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geowatch_threshold_source_total",
        "Total ticks by threshold source",
        &["site", "source"]
    )
    .unwrap()
});

/// Adaptive threshold strategies that could not produce a value.
/// Labels: strategy (baseline/sliding), reason (insufficient_data/degenerate_statistics)
pub static THRESHOLD_UNAVAILABLE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geowatch_threshold_unavailable_total",
        "Total adaptive threshold computations that returned unavailable",
        &["site", "strategy", "reason"]
    )
    .unwrap()
});

/// Persistence elevations applied.
pub static PERSISTENCE_ELEVATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geowatch_persistence_elevations_total",
        "Total ticks raised one level by 12h accumulation",
        &["site"]
    )
    .unwrap()
});

/// Advisory calls by outcome.
/// Labels: outcome (ok/error/timeout/skipped)
pub static ADVISORY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "geowatch_advisory_total",
        "Total advisory calls by outcome",
        &["site", "outcome"]
    )
    .unwrap()
});

/// Advisory round-trip latency in milliseconds.
pub static ADVISORY_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "geowatch_advisory_latency_ms",
        "Advisory call latency in milliseconds",
        &["site"],
        vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Latest velocity (mm/hr).
pub static VELOCITY_MM_HR: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "geowatch_velocity_mm_hr",
        "Velocity at the latest classified tick",
        &["site"]
    )
    .unwrap()
});

/// Latest state (0=NORMAL, 1=ALERTA, 2=ALARMA).
pub static STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "geowatch_state",
        "Alert level at the latest classified tick (0/1/2)",
        &["site"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record one classified tick.
    pub fn tick_classified(site: &str, level: AlertLevel, vel_mm_hr: Option<f64>) {
        TICKS_TOTAL
            .with_label_values(&[site, level.as_str()])
            .inc();
        STATE
            .with_label_values(&[site])
            .set(f64::from(level.severity()));
        if let Some(v) = vel_mm_hr {
            VELOCITY_MM_HR.with_label_values(&[site]).set(v);
        }
    }

    /// Record the threshold source used for a tick.
    pub fn threshold_source(site: &str, source: &ThresholdSource) {
        THRESHOLD_SOURCE_TOTAL
            .with_label_values(&[site, &source.to_string()])
            .inc();
    }

    /// Record an adaptive strategy that returned unavailable.
    pub fn threshold_unavailable(site: &str, strategy: &str, reason: &str) {
        THRESHOLD_UNAVAILABLE_TOTAL
            .with_label_values(&[site, strategy, reason])
            .inc();
    }

    /// Record a persistence elevation.
    pub fn persistence_elevated(site: &str) {
        PERSISTENCE_ELEVATIONS_TOTAL
            .with_label_values(&[site])
            .inc();
    }

    /// Record an advisory outcome.
    pub fn advisory(site: &str, outcome: &str) {
        ADVISORY_TOTAL.with_label_values(&[site, outcome]).inc();
    }

    /// Record advisory latency.
    pub fn advisory_latency(site: &str, latency_ms: f64) {
        ADVISORY_LATENCY_MS
            .with_label_values(&[site])
            .observe(latency_ms);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

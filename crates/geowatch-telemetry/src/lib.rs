//! Prometheus metrics and structured logging for geowatch.
//!
//! Recoverable conditions (thresholds unavailable, advisory failures) are
//! counted here so operators can tell a calm slope from a monitor that never
//! computed its adaptive thresholds.

pub mod error;
pub mod logging;
pub mod metrics;
pub mod run_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use run_stats::{RunStatsReporter, SiteRunStats};

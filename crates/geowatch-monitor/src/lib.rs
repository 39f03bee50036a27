//! Slope displacement monitor.
//!
//! Wires the geowatch crates into a per-site pipeline and a simulation
//! runner that replays a displacement series tick by tick, classifying
//! every tick and handing periodic snapshots to an advisor.

pub mod advisory;
pub mod app;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;

pub use advisory::{Advisor, Advisory, NoopAdvisor, TemplateAdvisor};
pub use app::{AdvisoryOutcome, AdvisoryResult, AdvisoryStats, Monitor, RunSummary};
pub use config::AppConfig;
pub use error::{AdvisoryError, AppError, AppResult};
pub use input::{parse_series, read_series};
pub use pipeline::{Classified, Pipeline};

//! geowatch - slope displacement monitor entry point
//!
//! Replays a displacement series, classifies every tick into
//! NORMAL / ALERTA / ALARMA, and writes the run summary as JSON.

use anyhow::Result;
use clap::Parser;
use geowatch_monitor::{Advisor, AppConfig, Monitor, NoopAdvisor, TemplateAdvisor};
use std::sync::Arc;
use tracing::info;

/// Slope displacement monitor
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GEOWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Series file: JSON array of {time, disp_mm}
    #[arg(short, long)]
    series: String,

    /// Write the run summary here instead of stdout
    #[arg(long)]
    summary: Option<String>,

    /// Build snapshots but never call the advisor
    #[arg(long)]
    dry_run: bool,

    /// Write Prometheus metrics here after the run
    #[arg(long)]
    metrics: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    geowatch_telemetry::init_logging()?;

    info!("Starting geowatch v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > GEOWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var(geowatch_monitor::config::CONFIG_PATH_ENV).ok())
        .unwrap_or_else(|| geowatch_monitor::config::DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = AppConfig::load_from(&config_path)?;
    if args.dry_run {
        config.advisory.dry_run = true;
    }
    info!(site = %config.site.name, dry_run = config.advisory.dry_run, "Configuration loaded");

    let series = geowatch_monitor::read_series(&args.series)?;
    info!(path = %args.series, points = series.len(), "Series loaded");

    let monitor = Monitor::new(config, series)?;
    let advisor: Arc<dyn Advisor> = if monitor.config().advisory.is_active() {
        Arc::new(TemplateAdvisor)
    } else {
        Arc::new(NoopAdvisor)
    };

    let summary = monitor.run_blocking(advisor)?;
    let json = serde_json::to_string_pretty(&summary)?;

    match args.summary {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(path = %path, "Run summary written");
        }
        None => println!("{json}"),
    }

    if let Some(path) = args.metrics {
        std::fs::write(&path, geowatch_telemetry::Metrics::render()?)?;
        info!(path = %path, "Metrics written");
    }

    Ok(())
}

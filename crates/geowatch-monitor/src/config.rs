//! Application configuration.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use geowatch_detector::{check_window_hours, DetectorConfig};
use geowatch_indicators::IndicatorConfig;
use geowatch_summary::SummaryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GEOWATCH_CONFIG";
/// Prefix for per-key environment overrides, e.g. `GEOWATCH__SITE__NAME`.
pub const ENV_PREFIX: &str = "GEOWATCH";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Monitored site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Label used in logs and metrics.
    #[serde(default = "default_site_name")]
    pub name: String,
}

fn default_site_name() -> String {
    "site".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

/// Input series handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Regular grid interval. Default: 2 minutes.
    #[serde(default = "default_resample_minutes")]
    pub resample_minutes: u32,
}

fn default_resample_minutes() -> u32 {
    2
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            resample_minutes: default_resample_minutes(),
        }
    }
}

/// Tick-loop pacing and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Emit a snapshot every N ticks. Classification still runs on every tick.
    #[serde(default = "default_step_points")]
    pub step_points: usize,
    /// Snapshot window length. Default: 120 minutes.
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: f64,
    /// Pause between ticks to emulate real-time pacing (ms). Default: 0.
    #[serde(default)]
    pub sleep_ms: u64,
    /// First tick to emit; earlier ticks only feed history.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Horizon for the accumulation-rate projection (hours). Default: 24.
    #[serde(default = "default_accum_period_hours")]
    pub accum_period_hours: f64,
    /// Points in the displacement/velocity slices of a snapshot. Default: 30.
    #[serde(default = "default_slice_points")]
    pub slice_points: usize,
    /// Ranked alarm ticks kept in the run report. Default: 10.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Shift length for per-shift reports (hours). Default: 12.
    #[serde(default = "default_shift_hours")]
    pub shift_hours: f64,
}

fn default_step_points() -> usize {
    1
}

fn default_lookback_minutes() -> f64 {
    120.0
}

fn default_accum_period_hours() -> f64 {
    24.0
}

fn default_slice_points() -> usize {
    30
}

fn default_top_k() -> usize {
    10
}

fn default_shift_hours() -> f64 {
    12.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_points: default_step_points(),
            lookback_minutes: default_lookback_minutes(),
            sleep_ms: 0,
            start_at: None,
            accum_period_hours: default_accum_period_hours(),
            slice_points: default_slice_points(),
            top_k: default_top_k(),
            shift_hours: default_shift_hours(),
        }
    }
}

/// Advisory (second-opinion) calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    #[serde(default = "default_advisory_enabled")]
    pub enabled: bool,
    /// Call the advisor on every N-th emitted snapshot. Default: 1.
    #[serde(default = "default_llm_every")]
    pub llm_every: usize,
    /// Call the advisor every N minutes of series time instead of `llm_every`.
    #[serde(default)]
    pub emit_every_minutes: Option<f64>,
    /// Per-call timeout (ms). Default: 60,000.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Build snapshots but never call the advisor.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_advisory_enabled() -> bool {
    true
}

fn default_llm_every() -> usize {
    1
}

fn default_timeout_ms() -> u64 {
    60_000
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_advisory_enabled(),
            llm_every: default_llm_every(),
            emit_every_minutes: None,
            timeout_ms: default_timeout_ms(),
            dry_run: false,
        }
    }
}

impl AdvisoryConfig {
    /// Whether any advisor call can happen during a run.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.dry_run
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
}

impl AppConfig {
    /// Load from `$GEOWATCH_CONFIG` (or `config/default.toml`) layered with
    /// `GEOWATCH__*` environment overrides. Falls back to defaults plus
    /// overrides when the file is missing.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Load `path` (when it exists) layered with environment overrides.
    pub fn load_from(path: &str) -> AppResult<Self> {
        let mut builder = ::config::Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(::config::File::new(path, ::config::FileFormat::Toml));
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
        }

        let config: Self = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(format!("Failed to assemble config: {e}")))?
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section. Invalid values are fatal, never clamped.
    pub fn validate(&self) -> AppResult<()> {
        if self.site.name.trim().is_empty() {
            return Err(AppError::Config("site.name must not be empty".to_string()));
        }
        if self.series.resample_minutes == 0 {
            return Err(AppError::Config(
                "series.resample_minutes must be positive".to_string(),
            ));
        }
        self.indicators
            .validate()
            .map_err(|e| AppError::Config(format!("indicators: {e}")))?;
        self.detector
            .validate()
            .map_err(|e| AppError::Config(format!("detector: {e}")))?;
        self.summary_config()
            .validate()
            .map_err(|e| AppError::Config(format!("simulation: {e}")))?;

        let sim = &self.simulation;
        if sim.step_points == 0 {
            return Err(AppError::Config(
                "simulation.step_points must be positive".to_string(),
            ));
        }
        if !sim.lookback_minutes.is_finite() || sim.lookback_minutes <= 0.0 {
            return Err(AppError::Config(format!(
                "simulation.lookback_minutes ({}) must be positive",
                sim.lookback_minutes
            )));
        }
        check_window_hours("shift_hours", sim.shift_hours)
            .map_err(|e| AppError::Config(format!("simulation: {e}")))?;

        let adv = &self.advisory;
        if adv.llm_every == 0 {
            return Err(AppError::Config(
                "advisory.llm_every must be positive".to_string(),
            ));
        }
        if adv.timeout_ms == 0 {
            return Err(AppError::Config(
                "advisory.timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(minutes) = adv.emit_every_minutes {
            check_window_hours("emit_every_minutes", minutes / 60.0)
                .map_err(|e| AppError::Config(format!("advisory: {e}")))?;
        }
        Ok(())
    }

    pub fn resample_interval(&self) -> Duration {
        Duration::minutes(i64::from(self.series.resample_minutes))
    }

    /// Snapshot window length in grid points (at least 1).
    pub fn lookback_points(&self) -> usize {
        let points = self.simulation.lookback_minutes / f64::from(self.series.resample_minutes);
        (points.round() as usize).max(1)
    }

    /// Summarizer settings derived from the other sections.
    pub fn summary_config(&self) -> SummaryConfig {
        SummaryConfig {
            bollinger_k: self.indicators.bollinger_k,
            accum_window_hours: self.detector.accum_window_hours,
            accum_period_hours: self.simulation.accum_period_hours,
            slice_points: self.simulation.slice_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.series.resample_minutes, 2);
        assert_eq!(config.indicators.ema_hours, vec![1.0, 3.0, 12.0]);
        assert_eq!(config.advisory.timeout_ms, 60_000);
        assert_eq!(config.lookback_points(), 60);
        assert!(config.advisory.is_active());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[site]
name = "pit-north"

[detector]
sliding_enabled = false

[detector.fixed]
v_alert = 0.8
v_alarm = 2.5

[simulation]
step_points = 5

[advisory]
llm_every = 3
dry_run = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.site.name, "pit-north");
        assert!(!config.detector.sliding_enabled);
        assert_eq!(config.detector.fixed.v_alert, 0.8);
        assert_eq!(config.detector.fixed.d_alert, 5.0);
        assert_eq!(config.simulation.step_points, 5);
        assert_eq!(config.advisory.llm_every, 3);
        assert!(!config.advisory.is_active());
        assert_eq!(config.detector.baseline_fraction, 0.2);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[detector.fixed]\nv_alert = 4.0\nv_alarm = 3.0").unwrap();

        let err = AppConfig::load_from(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/geowatch.toml").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[series]\nresample_minutes = 5").unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.series.resample_minutes, 5);
        assert_eq!(config.lookback_points(), 24);
    }

    #[test]
    fn test_validate_rejections() {
        let cases: Vec<Box<dyn Fn(&mut AppConfig)>> = vec![
            Box::new(|c| c.series.resample_minutes = 0),
            Box::new(|c| c.simulation.step_points = 0),
            Box::new(|c| c.simulation.lookback_minutes = f64::NAN),
            Box::new(|c| c.advisory.llm_every = 0),
            Box::new(|c| c.advisory.emit_every_minutes = Some(-1.0)),
            Box::new(|c| c.indicators.ema_hours.clear()),
            Box::new(|c| c.indicators.bollinger_k = 0.0),
            Box::new(|c| c.detector.baseline_fraction = 1.5),
            Box::new(|c| c.detector.fixed.v_alert = -1.0),
            Box::new(|c| c.site.name = " ".to_string()),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "case {i} should be rejected");
        }
    }

    #[test]
    fn test_validate_rejects_huge_windows() {
        let cases: Vec<Box<dyn Fn(&mut AppConfig)>> = vec![
            Box::new(|c| c.detector.sliding_window_hours = 1e15),
            Box::new(|c| c.detector.accum_window_hours = 1e15),
            Box::new(|c| c.simulation.shift_hours = 1e15),
            Box::new(|c| c.advisory.emit_every_minutes = Some(1e15)),
            Box::new(|c| c.detector.alarma_floor_ratio = 1.0),
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(config.validate().is_err(), "case {i} should be rejected");
        }

        let mut config = AppConfig::default();
        config.detector.sliding_window_hours = geowatch_core::MAX_WINDOW_HOURS;
        config.simulation.shift_hours = geowatch_core::MAX_WINDOW_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_summary_config_follows_sections() {
        let mut config = AppConfig::default();
        config.indicators.bollinger_k = 2.5;
        config.detector.accum_window_hours = 6.0;
        let summary = config.summary_config();
        assert_eq!(summary.bollinger_k, 2.5);
        assert_eq!(summary.accum_window_hours, 6.0);
        assert_eq!(summary.accum_period_hours, 24.0);
    }
}

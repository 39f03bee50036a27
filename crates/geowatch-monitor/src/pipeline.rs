//! Per-series classification pipeline.
//!
//! One `Pipeline` owns one site's series. Construction resamples the series,
//! precomputes indicators and the baseline thresholds; afterwards every
//! query is a pure function of `(series, index, config)`.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use geowatch_core::{Series, Thresholds};
use geowatch_detector::{
    ActiveThresholds, Decision, DetectorResult, RuleEngine, RuleInput, ThresholdEstimator,
};
use geowatch_indicators::IndicatorSet;
use geowatch_summary::{Snapshot, SummaryRequest, TickRecord, WindowSummarizer};
use geowatch_telemetry::Metrics;
use tracing::{info, warn};

/// Classification of one tick together with the thresholds it used.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub index: usize,
    pub decision: Decision,
    pub active: ActiveThresholds,
    pub accum_mm: Option<f64>,
}

pub struct Pipeline {
    site: String,
    indicators: IndicatorSet,
    abs_vel: Vec<f64>,
    estimator: ThresholdEstimator,
    engine: RuleEngine,
    summarizer: WindowSummarizer,
    baseline: DetectorResult<Thresholds>,
    accum_window_hours: f64,
    lookback_points: usize,
}

impl Pipeline {
    /// Build a pipeline for `series` (any order, any spacing).
    pub fn new(site: impl Into<String>, series: Series, config: &AppConfig) -> AppResult<Self> {
        config.validate()?;
        let site = site.into();
        if series.is_empty() {
            return Err(AppError::Input(format!("series for {site} is empty")));
        }

        let raw_len = series.len();
        let series = series.resample(config.resample_interval())?;
        let indicators = IndicatorSet::compute(series, &config.indicators);
        let abs_vel: Vec<f64> = indicators.velocity().iter().map(|v| v.abs()).collect();

        let estimator = ThresholdEstimator::new(config.detector.clone())?;
        let engine = RuleEngine::new(&config.detector)?;
        let summarizer = WindowSummarizer::new(config.summary_config())?;
        let baseline = estimator.baseline(&abs_vel);

        match &baseline {
            Ok(thr) => info!(
                site = %site,
                raw_points = raw_len,
                points = indicators.len(),
                alerta = thr.alerta(),
                alarma = thr.alarma(),
                "Baseline thresholds ready"
            ),
            Err(e) => warn!(
                site = %site,
                raw_points = raw_len,
                points = indicators.len(),
                error = %e,
                "Baseline thresholds unavailable"
            ),
        }

        Ok(Self {
            site,
            indicators,
            abs_vel,
            estimator,
            engine,
            summarizer,
            baseline,
            accum_window_hours: config.detector.accum_window_hours,
            lookback_points: config.lookback_points(),
        })
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    /// Resampled series.
    pub fn series(&self) -> &Series {
        self.indicators.series()
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }

    pub fn rule_engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Baseline thresholds, when the leading segment allowed them.
    pub fn initial_thresholds(&self) -> Option<Thresholds> {
        self.baseline.as_ref().ok().copied()
    }

    pub fn lookback_points(&self) -> usize {
        self.lookback_points
    }

    /// Thresholds in force at `index`.
    pub fn thresholds_at(&self, index: usize) -> ActiveThresholds {
        self.estimator
            .resolve_at(self.series(), &self.abs_vel, index, &self.baseline)
    }

    /// Classify tick `index`. Pure.
    pub fn classify(&self, index: usize) -> AppResult<Classified> {
        let point = self
            .series()
            .get(index)
            .copied()
            .ok_or_else(|| out_of_range(index, self.len()))?;

        let active = self.thresholds_at(index);
        let accum_mm = self.indicators.accumulation(index, self.accum_window_hours);
        let input = RuleInput {
            vel_mm_hr: self.indicators.velocity_at(index),
            disp_mm: point.disp_mm,
            accum_mm,
        };
        let decision = self.engine.classify(&input, &active);

        Ok(Classified {
            index,
            decision,
            active,
            accum_mm,
        })
    }

    /// Record a classification in the site's metrics.
    pub fn record_metrics(&self, classified: &Classified) {
        let decision = &classified.decision;
        Metrics::tick_classified(
            &self.site,
            decision.level,
            self.indicators.velocity_at(classified.index),
        );
        Metrics::threshold_source(&self.site, &decision.threshold_source);
        for skipped in &classified.active.unavailable {
            Metrics::threshold_unavailable(
                &self.site,
                skipped.strategy.as_str(),
                skipped.error.reason(),
            );
        }
        if decision.elevated {
            Metrics::persistence_elevated(&self.site);
        }
    }

    /// Compact log record for a classified tick.
    pub fn tick_record(&self, classified: &Classified) -> AppResult<TickRecord> {
        let index = classified.index;
        let point = self
            .series()
            .get(index)
            .ok_or_else(|| out_of_range(index, self.len()))?;
        Ok(TickRecord::from_decision(
            index,
            point,
            self.indicators.velocity_at(index),
            classified.accum_mm,
            &classified.decision,
        ))
    }

    /// Default request for tick `index` using the configured lookback.
    pub fn request<'a>(&self, index: usize) -> SummaryRequest<'a> {
        SummaryRequest::at(index).with_lookback(self.lookback_points)
    }

    /// Classify `request.index` and summarize it. Pure: repeated calls with
    /// the same request return equal snapshots.
    pub fn evaluate(&self, request: &SummaryRequest<'_>) -> AppResult<Snapshot> {
        let classified = self.classify(request.index)?;
        self.snapshot(&classified, request)
    }

    /// Summarize an already classified tick.
    pub fn snapshot(
        &self,
        classified: &Classified,
        request: &SummaryRequest<'_>,
    ) -> AppResult<Snapshot> {
        Ok(self.summarizer.summarize(
            &self.indicators,
            &classified.decision,
            self.engine.fixed_rules(),
            request,
        )?)
    }
}

fn out_of_range(index: usize, len: usize) -> AppError {
    AppError::Summary(geowatch_summary::SummaryError::IndexOutOfRange { index, len })
}

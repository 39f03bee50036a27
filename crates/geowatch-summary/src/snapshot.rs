//! Per-tick snapshot assembly.
//!
//! A `Snapshot` gathers everything a downstream reader needs about one tick:
//! current state, lookback-window aggregates, indicator values, the
//! thresholds and rule that decided the level, and short series context.
//! It is a pure function of its inputs; nothing reads the wall clock.

use crate::error::{SummaryError, SummaryResult};
use crate::events::Event;
use chrono::{DateTime, Utc};
use geowatch_core::{AlertLevel, FixedRules};
use geowatch_detector::{check_window_hours, Decision};
use geowatch_indicators::{bands, mean, BollingerBand, EmaValue, IndicatorSet};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Default lookback: 120 minutes on a 2-minute grid.
pub const DEFAULT_LOOKBACK_POINTS: usize = 60;

/// Summarizer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryConfig {
    /// Bollinger multiplier for the window bands.
    pub bollinger_k: f64,
    /// Trailing window for accumulated displacement (hours).
    pub accum_window_hours: f64,
    /// Horizon over which the window accumulation rate is projected (hours).
    pub accum_period_hours: f64,
    /// Maximum points kept in each downsampled slice.
    pub slice_points: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            bollinger_k: 2.0,
            accum_window_hours: 12.0,
            accum_period_hours: 24.0,
            slice_points: 30,
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.bollinger_k.is_finite() || self.bollinger_k <= 0.0 {
            return Err(format!(
                "bollinger_k ({}) must be positive",
                self.bollinger_k
            ));
        }
        check_window_hours("accum_window_hours", self.accum_window_hours)?;
        if !self.accum_period_hours.is_finite() || self.accum_period_hours < 0.0 {
            return Err(format!(
                "accum_period_hours ({}) must be non-negative",
                self.accum_period_hours
            ));
        }
        Ok(())
    }
}

/// What to summarize.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    /// Tick index into the series.
    pub index: usize,
    /// Window length in points, ending at `index` inclusive.
    pub lookback_points: usize,
    /// Events closed before this tick, oldest first.
    pub history: Option<&'a [Event]>,
}

impl<'a> SummaryRequest<'a> {
    pub fn at(index: usize) -> Self {
        Self {
            index,
            lookback_points: DEFAULT_LOOKBACK_POINTS,
            history: None,
        }
    }

    pub fn with_lookback(mut self, lookback_points: usize) -> Self {
        self.lookback_points = lookback_points;
        self
    }

    pub fn with_history(mut self, history: &'a [Event]) -> Self {
        self.history = Some(history);
        self
    }
}

/// State at the evaluated tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentState {
    pub time: DateTime<Utc>,
    pub disp_mm: f64,
    /// Displacement relative to the first sample of the series.
    pub cum_disp_mm: f64,
    /// Change since the previous tick (0 at the first tick).
    pub delta_mm: f64,
    pub vel_mm_hr: Option<f64>,
    pub acc_mm_hr2: Option<f64>,
    /// Displacement accumulated over the persistence window.
    pub accum_mm: Option<f64>,
    pub accum_window_hours: f64,
    /// Window displacement divided by window duration.
    pub accum_rate_mm_hr: f64,
    /// `accum_rate_mm_hr` projected over `accum_period_hours`.
    pub accum_projection_mm: f64,
    pub accum_period_hours: f64,
    pub state: AlertLevel,
}

/// Aggregates over the lookback window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMetrics {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub n_points: usize,
    pub duration_hours: f64,
    pub vel_mean_mm_hr: Option<f64>,
    /// Peak |velocity| in the window.
    pub vel_peak_mm_hr: Option<f64>,
    pub disp_delta_mm: f64,
    pub disp_min_mm: f64,
    pub t_disp_min: DateTime<Utc>,
    pub disp_max_mm: f64,
    pub t_disp_max: DateTime<Utc>,
    /// The window straddles zero displacement.
    pub sign_change: bool,
}

/// Indicator values at the evaluated tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorValues {
    pub ema: Vec<EmaValue>,
    pub bollinger_disp: Option<BollingerBand>,
    pub bollinger_vel: Option<BollingerBand>,
    pub inverse_velocity: Option<f64>,
}

/// Time since the most recent closed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryContext {
    pub events_so_far: usize,
    pub last_event_level: Option<AlertLevel>,
    pub last_event_end: Option<DateTime<Utc>>,
    pub hours_since_last_event: Option<f64>,
}

/// Series-wide context up to and including the evaluated tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesContext {
    pub start_time: DateTime<Utc>,
    pub elapsed_hours: f64,
    pub disp_min_mm: f64,
    pub disp_max_mm: f64,
    pub abs_vel_p95_mm_hr: Option<f64>,
    pub abs_vel_p99_mm_hr: Option<f64>,
    pub history: Option<HistoryContext>,
}

/// Downsampled `(time, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlicePoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Immutable per-tick summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub index: usize,
    pub current: CurrentState,
    pub window: WindowMetrics,
    pub indicators: IndicatorValues,
    pub decision: Decision,
    pub fixed_rules: FixedRules,
    pub context: SeriesContext,
    pub disp_slice: Vec<SlicePoint>,
    pub vel_slice: Vec<SlicePoint>,
}

impl Snapshot {
    pub fn level(&self) -> AlertLevel {
        self.current.state
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.current.time
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> SummaryResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Flat `dotted.key -> primitive` view for text generators.
    ///
    /// Missing indicators map to `null`, never to zero. Slices are omitted.
    pub fn to_flat_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: Value| {
            map.insert(key.to_string(), value);
        };
        let opt = |v: Option<f64>| v.map_or(Value::Null, |v| json!(v));

        let c = &self.current;
        put("index", json!(self.index));
        put("current.time", json!(c.time.to_rfc3339()));
        put("current.disp_mm", json!(c.disp_mm));
        put("current.cum_disp_mm", json!(c.cum_disp_mm));
        put("current.delta_mm", json!(c.delta_mm));
        put("current.vel_mm_hr", opt(c.vel_mm_hr));
        put("current.acc_mm_hr2", opt(c.acc_mm_hr2));
        put("current.accum_mm", opt(c.accum_mm));
        put("current.accum_window_hours", json!(c.accum_window_hours));
        put("current.accum_rate_mm_hr", json!(c.accum_rate_mm_hr));
        put("current.accum_projection_mm", json!(c.accum_projection_mm));
        put("current.accum_period_hours", json!(c.accum_period_hours));
        put("current.state", json!(c.state.as_str()));

        let w = &self.window;
        put("window.start", json!(w.start.to_rfc3339()));
        put("window.end", json!(w.end.to_rfc3339()));
        put("window.n_points", json!(w.n_points));
        put("window.duration_hours", json!(w.duration_hours));
        put("window.vel_mean_mm_hr", opt(w.vel_mean_mm_hr));
        put("window.vel_peak_mm_hr", opt(w.vel_peak_mm_hr));
        put("window.disp_delta_mm", json!(w.disp_delta_mm));
        put("window.disp_min_mm", json!(w.disp_min_mm));
        put("window.t_disp_min", json!(w.t_disp_min.to_rfc3339()));
        put("window.disp_max_mm", json!(w.disp_max_mm));
        put("window.t_disp_max", json!(w.t_disp_max.to_rfc3339()));
        put("window.sign_change", json!(w.sign_change));

        for e in &self.indicators.ema {
            put(&format!("ema.{}h", e.hours), opt(e.value));
        }
        for (name, band) in [
            ("disp", &self.indicators.bollinger_disp),
            ("vel", &self.indicators.bollinger_vel),
        ] {
            put(&format!("bollinger.{name}.center"), opt(band.map(|b| b.center)));
            put(&format!("bollinger.{name}.std"), opt(band.map(|b| b.std)));
            put(&format!("bollinger.{name}.upper"), opt(band.map(|b| b.upper)));
            put(&format!("bollinger.{name}.lower"), opt(band.map(|b| b.lower)));
            put(&format!("bollinger.{name}.pos_pct"), opt(band.map(|b| b.pos_pct)));
        }
        put("indicators.inverse_velocity", opt(self.indicators.inverse_velocity));

        let d = &self.decision;
        put("thresholds.alerta_mm_hr", opt(d.thresholds.map(|t| t.alerta())));
        put("thresholds.alarma_mm_hr", opt(d.thresholds.map(|t| t.alarma())));
        put("thresholds.source", json!(d.threshold_source.to_string()));
        put("decision.level", json!(d.level.as_str()));
        put("decision.base_level", json!(d.base_level.as_str()));
        put("decision.source", json!(d.source.as_str()));
        put("decision.rule", json!(d.rule));
        put("decision.base_rule", json!(d.base_rule));
        put("decision.elevated", json!(d.elevated));
        put("decision.insufficient_data", json!(d.insufficient_data));

        let f = &self.fixed_rules;
        put("fixed_rules.v_alert", json!(f.v_alert));
        put("fixed_rules.v_alarm", json!(f.v_alarm));
        put("fixed_rules.d_alert", json!(f.d_alert));
        put("fixed_rules.v_alarm_with_d1", json!(f.v_alarm_with_d1));
        put("fixed_rules.v_alarm_with_d2", json!(f.v_alarm_with_d2));

        let ctx = &self.context;
        put("context.start_time", json!(ctx.start_time.to_rfc3339()));
        put("context.elapsed_hours", json!(ctx.elapsed_hours));
        put("context.disp_min_mm", json!(ctx.disp_min_mm));
        put("context.disp_max_mm", json!(ctx.disp_max_mm));
        put("context.abs_vel_p95_mm_hr", opt(ctx.abs_vel_p95_mm_hr));
        put("context.abs_vel_p99_mm_hr", opt(ctx.abs_vel_p99_mm_hr));
        if let Some(h) = &ctx.history {
            put("history.events_so_far", json!(h.events_so_far));
            put(
                "history.last_event_level",
                h.last_event_level
                    .map_or(Value::Null, |l| json!(l.as_str())),
            );
            put(
                "history.last_event_end",
                h.last_event_end
                    .map_or(Value::Null, |t| json!(t.to_rfc3339())),
            );
            put("history.hours_since_last_event", opt(h.hours_since_last_event));
        }

        map
    }
}

fn hours_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 3_600_000.0
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Builds snapshots.
#[derive(Debug, Clone)]
pub struct WindowSummarizer {
    config: SummaryConfig,
}

impl WindowSummarizer {
    pub fn new(config: SummaryConfig) -> SummaryResult<Self> {
        config.validate().map_err(SummaryError::InvalidRequest)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Assemble the snapshot for `request.index`.
    pub fn summarize(
        &self,
        indicators: &IndicatorSet,
        decision: &Decision,
        fixed_rules: &FixedRules,
        request: &SummaryRequest<'_>,
    ) -> SummaryResult<Snapshot> {
        let points = indicators.series().points();
        let i = request.index;
        let len = points.len();
        if i >= len {
            return Err(SummaryError::IndexOutOfRange { index: i, len });
        }
        if request.lookback_points == 0 {
            return Err(SummaryError::InvalidRequest(
                "lookback_points must be at least 1".to_string(),
            ));
        }

        let start = (i + 1).saturating_sub(request.lookback_points);
        let window_points = &points[start..=i];
        let disp_window: Vec<f64> = window_points.iter().map(|p| p.disp_mm).collect();
        let vel_window = &indicators.velocity()[start..=i];

        let cur = points[i];
        let vel = indicators.velocity_at(i);
        let duration_hours = hours_between(points[start].time, cur.time);
        let disp_delta = cur.disp_mm - points[start].disp_mm;
        let accum_rate = disp_delta / duration_hours.max(1e-9);

        let current = CurrentState {
            time: cur.time,
            disp_mm: cur.disp_mm,
            cum_disp_mm: cur.disp_mm - points[0].disp_mm,
            delta_mm: if i > 0 {
                cur.disp_mm - points[i - 1].disp_mm
            } else {
                0.0
            },
            vel_mm_hr: vel,
            acc_mm_hr2: indicators.acceleration_at(i),
            accum_mm: indicators.accumulation(i, self.config.accum_window_hours),
            accum_window_hours: self.config.accum_window_hours,
            accum_rate_mm_hr: accum_rate,
            accum_projection_mm: accum_rate * self.config.accum_period_hours,
            accum_period_hours: self.config.accum_period_hours,
            state: decision.level,
        };

        let window = self.window_metrics(window_points, vel_window, duration_hours, disp_delta);

        let k = self.config.bollinger_k;
        let indicator_values = IndicatorValues {
            ema: indicators.ema_at(i),
            bollinger_disp: bands(&disp_window, cur.disp_mm, k),
            bollinger_vel: vel.and_then(|v| bands(vel_window, v, k)),
            inverse_velocity: indicators.inverse_velocity_at(i),
        };

        let context = self.series_context(indicators, i, request.history);

        Ok(Snapshot {
            index: i,
            current,
            window,
            indicators: indicator_values,
            decision: decision.clone(),
            fixed_rules: *fixed_rules,
            context,
            disp_slice: self.downsample(window_points.iter().map(|p| (p.time, finite(p.disp_mm)))),
            vel_slice: self.downsample(
                window_points
                    .iter()
                    .zip(vel_window)
                    .map(|(p, v)| (p.time, finite(*v))),
            ),
        })
    }

    fn window_metrics(
        &self,
        window_points: &[geowatch_core::SeriesPoint],
        vel_window: &[f64],
        duration_hours: f64,
        disp_delta: f64,
    ) -> WindowMetrics {
        let first = window_points[0];
        let last = window_points[window_points.len() - 1];

        let mut min = (first.disp_mm, first.time);
        let mut max = (first.disp_mm, first.time);
        for p in window_points.iter().filter(|p| p.disp_mm.is_finite()) {
            // NaN at the window start is replaced by the first finite sample
            if min.0.is_nan() || p.disp_mm < min.0 {
                min = (p.disp_mm, p.time);
            }
            if max.0.is_nan() || p.disp_mm > max.0 {
                max = (p.disp_mm, p.time);
            }
        }

        let vel_peak = vel_window
            .iter()
            .filter(|v| v.is_finite())
            .map(|v| v.abs())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        WindowMetrics {
            start: first.time,
            end: last.time,
            n_points: window_points.len(),
            duration_hours,
            vel_mean_mm_hr: mean(vel_window),
            vel_peak_mm_hr: vel_peak,
            disp_delta_mm: disp_delta,
            disp_min_mm: min.0,
            t_disp_min: min.1,
            disp_max_mm: max.0,
            t_disp_max: max.1,
            sign_change: min.0 <= 0.0 && 0.0 <= max.0,
        }
    }

    fn series_context(
        &self,
        indicators: &IndicatorSet,
        i: usize,
        history: Option<&[Event]>,
    ) -> SeriesContext {
        let points = &indicators.series().points()[..=i];
        let start_time = points[0].time;
        let (abs_vel_p95, abs_vel_p99) = indicators.abs_vel_percentiles_to(i);

        let (disp_min, disp_max) = points
            .iter()
            .map(|p| p.disp_mm)
            .filter(|d| d.is_finite())
            .fold((f64::NAN, f64::NAN), |(lo, hi), d| (lo.min(d), hi.max(d)));

        let history = history.map(|events| {
            let now = points[i].time;
            let closed: Vec<&Event> = events.iter().filter(|e| e.end_index < i).collect();
            let last = closed.last();
            HistoryContext {
                events_so_far: closed.len(),
                last_event_level: last.map(|e| e.level),
                last_event_end: last.map(|e| e.end),
                hours_since_last_event: last.map(|e| hours_between(e.end, now)),
            }
        });

        SeriesContext {
            start_time,
            elapsed_hours: hours_between(start_time, points[i].time),
            disp_min_mm: disp_min,
            disp_max_mm: disp_max,
            abs_vel_p95_mm_hr: abs_vel_p95,
            abs_vel_p99_mm_hr: abs_vel_p99,
            history,
        }
    }

    fn downsample(
        &self,
        pairs: impl Iterator<Item = (DateTime<Utc>, Option<f64>)>,
    ) -> Vec<SlicePoint> {
        let all: Vec<SlicePoint> = pairs.map(|(time, value)| SlicePoint { time, value }).collect();
        let k = self.config.slice_points;
        if k == 0 {
            return Vec::new();
        }
        if all.len() <= k {
            return all;
        }
        let step = (all.len() / k).max(1);
        all.into_iter().step_by(step).take(k).collect()
    }
}

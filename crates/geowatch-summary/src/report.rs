//! Tick log and range reports.
//!
//! The tick log keeps one compact record per classified tick, ordered by
//! time, and answers range queries: level distribution, |velocity| and
//! accumulation percentiles, and the events inside a window (12h shift
//! reports, the end-of-run report).

use crate::error::{SummaryError, SummaryResult};
use crate::events::{ClassifiedTick, Event, EventAggregator};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Duration, Utc};
use geowatch_core::{hours_to_duration, AlertLevel, SeriesPoint, ThresholdSource, Thresholds};
use geowatch_detector::{Decision, DecisionSource};
use geowatch_indicators::{mean, percentile};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// One classified tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub disp_mm: f64,
    pub vel_mm_hr: Option<f64>,
    pub accum_mm: Option<f64>,
    pub level: AlertLevel,
    pub source: DecisionSource,
    pub rule: String,
    pub threshold_source: ThresholdSource,
    pub elevated: bool,
}

impl TickRecord {
    pub fn from_decision(
        index: usize,
        point: &SeriesPoint,
        vel_mm_hr: Option<f64>,
        accum_mm: Option<f64>,
        decision: &Decision,
    ) -> Self {
        Self {
            index,
            time: point.time,
            disp_mm: point.disp_mm,
            vel_mm_hr,
            accum_mm,
            level: decision.level,
            source: decision.source,
            rule: decision.rule.clone(),
            threshold_source: decision.threshold_source,
            elevated: decision.elevated,
        }
    }

    pub fn to_classified(&self) -> ClassifiedTick {
        ClassifiedTick {
            time: self.time,
            disp_mm: self.disp_mm,
            vel_mm_hr: self.vel_mm_hr,
            level: self.level,
        }
    }
}

impl From<&Snapshot> for TickRecord {
    fn from(snap: &Snapshot) -> Self {
        Self {
            index: snap.index,
            time: snap.current.time,
            disp_mm: snap.current.disp_mm,
            vel_mm_hr: snap.current.vel_mm_hr,
            accum_mm: snap.current.accum_mm,
            level: snap.decision.level,
            source: snap.decision.source,
            rule: snap.decision.rule.clone(),
            threshold_source: snap.decision.threshold_source,
            elevated: snap.decision.elevated,
        }
    }
}

/// Tick counts per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelDistribution {
    pub normal: usize,
    pub alerta: usize,
    pub alarma: usize,
}

impl LevelDistribution {
    pub fn from_records(records: &[TickRecord]) -> Self {
        let mut dist = Self::default();
        for r in records {
            match r.level {
                AlertLevel::Normal => dist.normal += 1,
                AlertLevel::Alerta => dist.alerta += 1,
                AlertLevel::Alarma => dist.alarma += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.normal + self.alerta + self.alarma
    }

    pub fn count(&self, level: AlertLevel) -> usize {
        match level {
            AlertLevel::Normal => self.normal,
            AlertLevel::Alerta => self.alerta,
            AlertLevel::Alarma => self.alarma,
        }
    }

    /// Share of ticks at `level`; 0 for an empty range.
    pub fn fraction(&self, level: AlertLevel) -> f64 {
        match self.total() {
            0 => 0.0,
            n => self.count(level) as f64 / n as f64,
        }
    }

    /// Most severe level present.
    pub fn max_level(&self) -> AlertLevel {
        if self.alarma > 0 {
            AlertLevel::Alarma
        } else if self.alerta > 0 {
            AlertLevel::Alerta
        } else {
            AlertLevel::Normal
        }
    }
}

/// Summary statistics over finite values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueStats {
    pub n: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

impl ValueStats {
    /// `None` when no value is finite.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let n = values.iter().filter(|v| v.is_finite()).count();
        Some(Self {
            n,
            mean: mean(values)?,
            p50: percentile(values, 50.0)?,
            p95: percentile(values, 95.0)?,
            p99: percentile(values, 99.0)?,
            min: percentile(values, 0.0)?,
            max: percentile(values, 100.0)?,
        })
    }
}

fn abs_values(records: &[TickRecord], f: impl Fn(&TickRecord) -> Option<f64>) -> Vec<f64> {
    records.iter().filter_map(f).map(f64::abs).collect()
}

/// One ranked tick in a top-K list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTick {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub level: AlertLevel,
    pub vel_mm_hr: Option<f64>,
    pub accum_mm: Option<f64>,
    pub rule: String,
}

impl From<&TickRecord> for RankedTick {
    fn from(r: &TickRecord) -> Self {
        Self {
            index: r.index,
            time: r.time,
            level: r.level,
            vel_mm_hr: r.vel_mm_hr,
            accum_mm: r.accum_mm,
            rule: r.rule.clone(),
        }
    }
}

/// Report for a half-open time range `[from, to)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub n_ticks: usize,
    pub distribution: LevelDistribution,
    pub max_level: AlertLevel,
    pub abs_vel: Option<ValueStats>,
    pub abs_accum: Option<ValueStats>,
    pub events: Vec<Event>,
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub n_ticks: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub distribution: LevelDistribution,
    pub by_source: BTreeMap<String, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub by_threshold_source: BTreeMap<String, usize>,
    pub elevations: usize,
    /// ALARMA ticks with the highest |velocity|.
    pub top_alarms_by_velocity: Vec<RankedTick>,
    /// ALARMA ticks with the highest |accumulation|.
    pub top_alarms_by_accum: Vec<RankedTick>,
    pub abs_vel: Option<ValueStats>,
    pub accum: Option<ValueStats>,
    pub initial_thresholds: Option<Thresholds>,
    pub events: Vec<Event>,
}

/// Time-ordered log of classified ticks.
#[derive(Debug, Clone, Default)]
pub struct TickLog {
    records: Vec<TickRecord>,
}

impl TickLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; its time must be after the last one.
    pub fn push(&mut self, record: TickRecord) -> SummaryResult<()> {
        if let Some(last) = self.records.last() {
            if record.time <= last.time {
                return Err(SummaryError::OutOfOrder {
                    time: record.time,
                    last: last.time,
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[TickRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with `from <= time < to`.
    pub fn range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> &[TickRecord] {
        let lo = self.records.partition_point(|r| r.time < from);
        let hi = self.records.partition_point(|r| r.time < to);
        &self.records[lo..hi.max(lo)]
    }

    /// Events over the whole log.
    pub fn events(&self) -> Vec<Event> {
        events_of(&self.records)
    }

    /// Report for `[from, to)`.
    pub fn shift_report(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> ShiftReport {
        let records = self.range(from, to);
        let distribution = LevelDistribution::from_records(records);
        ShiftReport {
            from,
            to,
            n_ticks: records.len(),
            distribution,
            max_level: distribution.max_level(),
            abs_vel: ValueStats::from_values(&abs_values(records, |r| r.vel_mm_hr)),
            abs_accum: ValueStats::from_values(&abs_values(records, |r| r.accum_mm)),
            events: events_of(records),
        }
    }

    /// Consecutive `[t0 + k·hours, t0 + (k+1)·hours)` reports covering the log.
    /// A shift reaching past the representable time range closes the log.
    pub fn shift_reports(&self, hours: f64) -> SummaryResult<Vec<ShiftReport>> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(SummaryError::InvalidRequest(format!(
                "shift length ({hours}h) must be positive"
            )));
        }
        let (Some(first), Some(last)) = (self.records.first(), self.records.last()) else {
            return Ok(Vec::new());
        };
        let width = hours_to_duration(hours);
        if width.is_some_and(|w| w <= Duration::zero()) {
            return Err(SummaryError::InvalidRequest(format!(
                "shift length ({hours}h) is below one millisecond"
            )));
        }

        let mut reports = Vec::new();
        let mut from = first.time;
        while from <= last.time {
            let Some(to) = width.and_then(|w| from.checked_add_signed(w)) else {
                reports.push(self.shift_report(from, DateTime::<Utc>::MAX_UTC));
                break;
            };
            reports.push(self.shift_report(from, to));
            from = to;
        }
        Ok(reports)
    }

    /// End-of-run report with top-`top_k` alarm rankings.
    pub fn run_report(&self, top_k: usize, initial_thresholds: Option<Thresholds>) -> RunReport {
        let records = &self.records;

        let mut by_source = BTreeMap::new();
        let mut by_rule = BTreeMap::new();
        let mut by_threshold_source = BTreeMap::new();
        for r in records {
            *by_source.entry(r.source.to_string()).or_insert(0) += 1;
            *by_rule.entry(r.rule.clone()).or_insert(0) += 1;
            *by_threshold_source
                .entry(r.threshold_source.to_string())
                .or_insert(0) += 1;
        }

        let alarms: Vec<&TickRecord> = records
            .iter()
            .filter(|r| r.level == AlertLevel::Alarma)
            .collect();
        let top_by = |key: fn(&TickRecord) -> Option<f64>| -> Vec<RankedTick> {
            let mut ranked: Vec<(f64, &TickRecord)> = alarms
                .iter()
                .filter_map(|r| key(r).filter(|v| v.is_finite()).map(|v| (v.abs(), *r)))
                .collect();
            // Stable sort keeps earlier ticks first on ties
            ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            ranked
                .into_iter()
                .take(top_k)
                .map(|(_, r)| RankedTick::from(r))
                .collect()
        };

        let report = RunReport {
            n_ticks: records.len(),
            start: records.first().map(|r| r.time),
            end: records.last().map(|r| r.time),
            distribution: LevelDistribution::from_records(records),
            by_source,
            by_rule,
            by_threshold_source,
            elevations: records.iter().filter(|r| r.elevated).count(),
            top_alarms_by_velocity: top_by(|r| r.vel_mm_hr),
            top_alarms_by_accum: top_by(|r| r.accum_mm),
            abs_vel: ValueStats::from_values(&abs_values(records, |r| r.vel_mm_hr)),
            accum: ValueStats::from_values(
                &records.iter().filter_map(|r| r.accum_mm).collect::<Vec<_>>(),
            ),
            initial_thresholds,
            events: self.events(),
        };
        debug!(
            ticks = report.n_ticks,
            events = report.events.len(),
            alarms = alarms.len(),
            "Run report built"
        );
        report
    }
}

/// Events over `records`, with indices mapped back to tick indices.
fn events_of(records: &[TickRecord]) -> Vec<Event> {
    let ticks: Vec<ClassifiedTick> = records.iter().map(TickRecord::to_classified).collect();
    EventAggregator::aggregate(&ticks)
        .into_iter()
        .map(|mut e| {
            e.start_index = records[e.start_index].index;
            e.end_index = records[e.end_index].index;
            e
        })
        .collect()
}

//! Simulation runner.
//!
//! Walks one site's series tick by tick:
//! - classifies every tick and appends it to the tick log
//! - emits a snapshot every `step_points` ticks and on the final tick
//! - hands due snapshots to the advisor on a blocking task under a timeout
//!
//! Advisor results come back over a channel and are drained without
//! waiting, so a slow or failing advisor never delays the next tick.

use crate::advisory::{Advisor, Advisory};
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::pipeline::Pipeline;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use geowatch_core::{hours_to_duration, AlertLevel, Series};
use geowatch_summary::{Event, EventAggregator, RunReport, ShiftReport, Snapshot, TickLog};
use geowatch_telemetry::{Metrics, RunStatsReporter, SiteRunStats};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Pending advisor results buffered between drains.
const ADVISORY_CHANNEL_CAPACITY: usize = 100;

/// How long runtime shutdown waits for advisor calls abandoned on timeout.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How one advisor call ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvisoryOutcome {
    Ok { advisory: Advisory },
    Error { message: String },
    Timeout,
}

impl AdvisoryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok { .. } => "ok",
            Self::Error { .. } => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// One completed advisor call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisoryResult {
    pub index: usize,
    pub time: DateTime<Utc>,
    /// Level assigned by the rule engine.
    pub rule_level: AlertLevel,
    pub outcome: AdvisoryOutcome,
    pub latency_ms: f64,
}

impl AdvisoryResult {
    pub fn disagrees(&self) -> bool {
        match &self.outcome {
            AdvisoryOutcome::Ok { advisory } => advisory.disagrees_with(self.rule_level),
            _ => false,
        }
    }
}

/// Advisor call counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdvisoryStats {
    pub requested: u64,
    pub ok: u64,
    pub errors: u64,
    pub timeouts: u64,
    /// Emitted snapshots that were not sent to the advisor.
    pub skipped: u64,
    /// Advisor level differed from the rule-engine level.
    pub disagreements: u64,
}

impl AdvisoryStats {
    fn record(&mut self, result: &AdvisoryResult) {
        match result.outcome {
            AdvisoryOutcome::Ok { .. } => self.ok += 1,
            AdvisoryOutcome::Error { .. } => self.errors += 1,
            AdvisoryOutcome::Timeout => self.timeouts += 1,
        }
        if result.disagrees() {
            self.disagreements += 1;
        }
    }

    pub fn completed(&self) -> u64 {
        self.ok + self.errors + self.timeouts
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub site: String,
    /// Ticks classified (from the start offset on).
    pub ticks: usize,
    pub snapshots_emitted: usize,
    pub report: RunReport,
    pub shifts: Vec<ShiftReport>,
    pub advisory: AdvisoryStats,
    pub advisories: Vec<AdvisoryResult>,
    /// Cumulative process-wide counters for the site.
    pub site_stats: SiteRunStats,
    pub last_snapshot: Option<Snapshot>,
}

/// Decides which emitted snapshots go to the advisor.
///
/// With `emit_every_minutes`, due times sit on a fixed grid
/// `anchor + k·every`; a late tick consumes its slot without shifting later ones.
#[derive(Debug)]
struct AdvisoryCadence {
    active: bool,
    llm_every: usize,
    every: Option<ChronoDuration>,
    next_due: Option<DateTime<Utc>>,
    emitted: usize,
}

impl AdvisoryCadence {
    /// `anchor` is the first due time; `None` anchors on the first emitted snapshot.
    fn new(config: &AppConfig, anchor: Option<DateTime<Utc>>) -> Self {
        let every = config
            .advisory
            .emit_every_minutes
            .and_then(|m| hours_to_duration(m / 60.0));
        Self {
            active: config.advisory.is_active(),
            llm_every: config.advisory.llm_every,
            every,
            next_due: anchor,
            emitted: 0,
        }
    }

    /// Register an emitted snapshot at `time`; true when the advisor is due.
    fn due(&mut self, time: DateTime<Utc>) -> bool {
        self.emitted += 1;
        if !self.active {
            return false;
        }
        match self.every {
            Some(every) => {
                let due = *self.next_due.get_or_insert(time);
                if time < due {
                    return false;
                }
                let every_ms = every.num_milliseconds().max(1);
                let slots = (time - due).num_milliseconds() / every_ms + 1;
                self.next_due = Some(
                    ChronoDuration::try_milliseconds(slots.saturating_mul(every_ms))
                        .and_then(|step| due.checked_add_signed(step))
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                );
                true
            }
            None => (self.emitted - 1) % self.llm_every == 0,
        }
    }
}

/// Runs one site's series through the pipeline.
pub struct Monitor {
    config: AppConfig,
    pipeline: Pipeline,
    run_stats: RunStatsReporter,
}

impl Monitor {
    pub fn new(config: AppConfig, series: Series) -> AppResult<Self> {
        let pipeline = Pipeline::new(config.site.name.clone(), series, &config)?;
        let run_stats = RunStatsReporter::new(vec![config.site.name.clone()]);
        Ok(Self {
            config,
            pipeline,
            run_stats,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// First tick to classify, from `simulation.start_at`.
    pub fn start_index(&self) -> usize {
        self.config
            .simulation
            .start_at
            .map_or(0, |t| self.pipeline.series().index_at_or_after(t))
    }

    /// Run the whole series on a dedicated runtime. Shutdown waits at most
    /// [`SHUTDOWN_GRACE`] for advisor calls that outlived their timeout.
    /// Must not be called from inside a runtime.
    pub fn run_blocking(&self, advisor: Arc<dyn Advisor>) -> AppResult<RunSummary> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let summary = runtime.block_on(self.run(advisor));
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        summary
    }

    /// Run the whole series.
    pub async fn run(&self, advisor: Arc<dyn Advisor>) -> AppResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", site = %self.pipeline.site(), %run_id);
        self.run_inner(run_id, advisor).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, advisor: Arc<dyn Advisor>) -> AppResult<RunSummary> {
        let site = self.pipeline.site().to_string();
        let sim = &self.config.simulation;
        let timeout = Duration::from_millis(self.config.advisory.timeout_ms);
        let start = self.start_index();
        let len = self.pipeline.len();

        info!(
            ticks = len.saturating_sub(start),
            start_index = start,
            step_points = sim.step_points,
            advisory = self.config.advisory.is_active(),
            "Starting run"
        );

        let (result_tx, mut result_rx) = mpsc::channel::<AdvisoryResult>(ADVISORY_CHANNEL_CAPACITY);
        let anchor = sim
            .start_at
            .or_else(|| self.pipeline.series().points().first().map(|p| p.time));
        let mut cadence = AdvisoryCadence::new(&self.config, anchor);
        let mut log = TickLog::new();
        let mut aggregator = EventAggregator::new();
        let mut history: Vec<Event> = Vec::new();
        let mut stats = AdvisoryStats::default();
        let mut advisories = Vec::new();
        let mut snapshots_emitted = 0;
        let mut last_snapshot = None;
        let mut last_level: Option<AlertLevel> = None;

        for index in start..len {
            let classified = self.pipeline.classify(index)?;
            self.pipeline.record_metrics(&classified);
            let record = self.pipeline.tick_record(&classified)?;
            let decision = &classified.decision;

            if last_level != Some(decision.level) {
                info!(
                    index,
                    time = %record.time,
                    level = %decision.level,
                    source = %decision.source,
                    rule = %decision.rule,
                    thresholds = %decision.threshold_source,
                    "Level changed"
                );
                last_level = Some(decision.level);
            }

            history.extend(aggregator.push(&record.to_classified()));
            log.push(record)?;

            drain_ready(&mut result_rx, &site, &mut stats, &mut advisories);

            if (index - start) % sim.step_points == 0 || index + 1 == len {
                let request = self.pipeline.request(index).with_history(&history);
                let snapshot = self.pipeline.snapshot(&classified, &request)?;
                snapshots_emitted += 1;

                if cadence.due(snapshot.time()) {
                    stats.requested += 1;
                    spawn_advisory(
                        Arc::clone(&advisor),
                        snapshot.clone(),
                        timeout,
                        result_tx.clone(),
                    );
                    // Let the advisor task start on single-threaded runtimes.
                    tokio::task::yield_now().await;
                } else {
                    stats.skipped += 1;
                    Metrics::advisory(&site, "skipped");
                    if self.config.advisory.dry_run {
                        let json = snapshot.to_json()?;
                        debug!(index, snapshot = %json, "Dry run snapshot");
                    }
                }
                last_snapshot = Some(snapshot);
            }

            if sim.sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(sim.sleep_ms)).await;
            }
        }

        // Every in-flight task holds a sender clone and finishes within its timeout.
        drop(result_tx);
        while let Some(result) = result_rx.recv().await {
            record_result(result, &site, &mut stats, &mut advisories);
        }
        advisories.sort_by_key(|r| r.index);

        let report = log.run_report(sim.top_k, self.pipeline.initial_thresholds());
        let shifts = log.shift_reports(sim.shift_hours)?;

        self.run_stats.output_summary();
        let site_stats = self
            .run_stats
            .get_stats()
            .into_iter()
            .next()
            .unwrap_or_default();

        info!(
            ticks = report.n_ticks,
            events = report.events.len(),
            max_level = %report.distribution.max_level(),
            snapshots = snapshots_emitted,
            advisory_ok = stats.ok,
            advisory_errors = stats.errors,
            advisory_timeouts = stats.timeouts,
            disagreements = stats.disagreements,
            "Run complete"
        );

        Ok(RunSummary {
            run_id,
            site,
            ticks: log.len(),
            snapshots_emitted,
            report,
            shifts,
            advisory: stats,
            advisories,
            site_stats,
            last_snapshot,
        })
    }
}

fn spawn_advisory(
    advisor: Arc<dyn Advisor>,
    snapshot: Snapshot,
    timeout: Duration,
    result_tx: mpsc::Sender<AdvisoryResult>,
) {
    let index = snapshot.index;
    let time = snapshot.time();
    let rule_level = snapshot.level();

    tokio::spawn(async move {
        let started = Instant::now();
        let call = tokio::task::spawn_blocking(move || advisor.advise(&snapshot));
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(advisory))) => AdvisoryOutcome::Ok { advisory },
            Ok(Ok(Err(e))) => AdvisoryOutcome::Error {
                message: e.to_string(),
            },
            Ok(Err(e)) => AdvisoryOutcome::Error {
                message: format!("advisor task failed: {e}"),
            },
            Err(_) => AdvisoryOutcome::Timeout,
        };

        let result = AdvisoryResult {
            index,
            time,
            rule_level,
            outcome,
            latency_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        if result_tx.send(result).await.is_err() {
            debug!(index, "Advisory result dropped, runner gone");
        }
    });
}

fn drain_ready(
    rx: &mut mpsc::Receiver<AdvisoryResult>,
    site: &str,
    stats: &mut AdvisoryStats,
    advisories: &mut Vec<AdvisoryResult>,
) {
    loop {
        match rx.try_recv() {
            Ok(result) => record_result(result, site, stats, advisories),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
}

fn record_result(
    result: AdvisoryResult,
    site: &str,
    stats: &mut AdvisoryStats,
    advisories: &mut Vec<AdvisoryResult>,
) {
    Metrics::advisory(site, result.outcome.label());
    Metrics::advisory_latency(site, result.latency_ms);

    match &result.outcome {
        AdvisoryOutcome::Ok { advisory } => {
            if result.disagrees() {
                warn!(
                    index = result.index,
                    rule_level = %result.rule_level,
                    advisory_level = ?advisory.level,
                    "Advisory disagrees with rule engine"
                );
            } else {
                debug!(index = result.index, rationale = %advisory.rationale, "Advisory received");
            }
        }
        AdvisoryOutcome::Error { message } => {
            warn!(index = result.index, error = %message, "Advisory failed");
        }
        AdvisoryOutcome::Timeout => {
            warn!(
                index = result.index,
                latency_ms = result.latency_ms,
                "Advisory timed out"
            );
        }
    }

    stats.record(&result);
    advisories.push(result);
}

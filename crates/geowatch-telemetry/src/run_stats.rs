//! End-of-run statistics read back from the Prometheus counters.
//!
//! Answers the operator question the counters alone leave open: a run with
//! no alarms is either a calm slope or a monitor that only ever had its
//! fixed rules to go on.

use crate::metrics::{
    ADVISORY_TOTAL, PERSISTENCE_ELEVATIONS_TOTAL, THRESHOLD_SOURCE_TOTAL,
    THRESHOLD_UNAVAILABLE_TOTAL, TICKS_TOTAL,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use serde::Serialize;
use tracing::{info, warn};

/// Per-site counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteRunStats {
    pub site: String,
    pub ticks_normal: u64,
    pub ticks_alerta: u64,
    pub ticks_alarma: u64,
    /// Ticks whose thresholds came from the sliding or baseline strategy.
    pub adaptive_ticks: u64,
    pub fixed_only_ticks: u64,
    pub unavailable_insufficient_data: u64,
    pub unavailable_degenerate: u64,
    pub persistence_elevations: u64,
    pub advisory_ok: u64,
    pub advisory_error: u64,
    pub advisory_timeout: u64,
    pub advisory_skipped: u64,
}

impl SiteRunStats {
    pub fn ticks_total(&self) -> u64 {
        self.ticks_normal + self.ticks_alerta + self.ticks_alarma
    }

    /// Fraction of ticks classified with adaptive thresholds available.
    pub fn adaptive_coverage(&self) -> f64 {
        let total = self.adaptive_ticks + self.fixed_only_ticks;
        if total == 0 {
            0.0
        } else {
            self.adaptive_ticks as f64 / total as f64
        }
    }

    /// True when nothing fired and adaptive thresholds were never in play.
    pub fn quiet_without_thresholds(&self) -> bool {
        self.ticks_alerta + self.ticks_alarma == 0
            && self.ticks_total() > 0
            && self.adaptive_ticks == 0
    }
}

/// Reads the global counters back for a fixed set of sites.
pub struct RunStatsReporter {
    sites: Vec<String>,
    start_time: DateTime<Utc>,
}

impl RunStatsReporter {
    pub fn new(sites: Vec<String>) -> Self {
        Self {
            sites,
            start_time: Utc::now(),
        }
    }

    pub fn get_stats(&self) -> Vec<SiteRunStats> {
        self.sites.iter().map(|s| self.get_site_stats(s)).collect()
    }

    fn get_site_stats(&self, site: &str) -> SiteRunStats {
        let count = |counter: &CounterVec, labels: &[&str]| -> u64 {
            counter.with_label_values(labels).get() as u64
        };

        let fixed_only_ticks = count(&THRESHOLD_SOURCE_TOTAL, &[site, "fixed_only"]);
        let all_sources = sum_matching(&THRESHOLD_SOURCE_TOTAL, &[("site", site)]);

        SiteRunStats {
            site: site.to_string(),
            ticks_normal: count(&TICKS_TOTAL, &[site, "NORMAL"]),
            ticks_alerta: count(&TICKS_TOTAL, &[site, "ALERTA"]),
            ticks_alarma: count(&TICKS_TOTAL, &[site, "ALARMA"]),
            adaptive_ticks: all_sources.saturating_sub(fixed_only_ticks),
            fixed_only_ticks,
            unavailable_insufficient_data: sum_matching(
                &THRESHOLD_UNAVAILABLE_TOTAL,
                &[("site", site), ("reason", "insufficient_data")],
            ),
            unavailable_degenerate: sum_matching(
                &THRESHOLD_UNAVAILABLE_TOTAL,
                &[("site", site), ("reason", "degenerate_statistics")],
            ),
            persistence_elevations: count(&PERSISTENCE_ELEVATIONS_TOTAL, &[site]),
            advisory_ok: count(&ADVISORY_TOTAL, &[site, "ok"]),
            advisory_error: count(&ADVISORY_TOTAL, &[site, "error"]),
            advisory_timeout: count(&ADVISORY_TOTAL, &[site, "timeout"]),
            advisory_skipped: count(&ADVISORY_TOTAL, &[site, "skipped"]),
        }
    }

    /// Log the run summary.
    pub fn output_summary(&self) {
        let elapsed = Utc::now() - self.start_time;

        info!("========== Run Statistics Summary ==========");
        info!(
            "Started: {} ({} s wall clock)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.num_seconds()
        );

        for s in self.get_stats() {
            info!("--- {} ---", s.site);
            info!(
                "  Ticks: {} (NORMAL: {}, ALERTA: {}, ALARMA: {})",
                s.ticks_total(),
                s.ticks_normal,
                s.ticks_alerta,
                s.ticks_alarma
            );
            info!(
                "  Adaptive coverage: {:.1}% (fixed_only ticks: {})",
                s.adaptive_coverage() * 100.0,
                s.fixed_only_ticks
            );
            info!(
                "  Thresholds unavailable: insufficient_data={}, degenerate={}",
                s.unavailable_insufficient_data, s.unavailable_degenerate
            );
            info!("  Persistence elevations: {}", s.persistence_elevations);
            info!(
                "  Advisory: ok={}, error={}, timeout={}, skipped={}",
                s.advisory_ok, s.advisory_error, s.advisory_timeout, s.advisory_skipped
            );
            if s.quiet_without_thresholds() {
                warn!(
                    site = %s.site,
                    "No alerts raised, but adaptive thresholds were never available"
                );
            }
        }

        info!("============================================");
    }
}

/// Sum every series of `counter` whose labels include all `filters`.
fn sum_matching(counter: &CounterVec, filters: &[(&str, &str)]) -> u64 {
    let mut total = 0.0;
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let labels = m.get_label();
            let matches = filters.iter().all(|(name, value)| {
                labels
                    .iter()
                    .any(|pair| pair.get_name() == *name && pair.get_value() == *value)
            });
            if matches {
                total += m.get_counter().get_value();
            }
        }
    }
    total as u64
}

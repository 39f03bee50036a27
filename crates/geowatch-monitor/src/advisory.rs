//! Advisory boundary.
//!
//! An advisor reviews an emitted snapshot and returns a second opinion.
//! Advisors run on blocking threads under a timeout and their output never
//! feeds back into classification. Transport concerns (HTTP, retries,
//! backoff) belong to the advisor implementation.

use crate::error::AdvisoryError;
use geowatch_core::AlertLevel;
use geowatch_detector::DecisionSource;
use geowatch_summary::Snapshot;
use serde::{Deserialize, Serialize};

/// Second opinion on one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// Level proposed by the advisor, if it committed to one.
    pub level: Option<AlertLevel>,
    pub rationale: String,
}

impl Advisory {
    /// The advisor proposed a level different from the rule engine's.
    pub fn disagrees_with(&self, level: AlertLevel) -> bool {
        self.level.is_some_and(|l| l != level)
    }
}

/// Reviews snapshots. Implementations may block.
#[cfg_attr(test, mockall::automock)]
pub trait Advisor: Send + Sync + 'static {
    fn advise(&self, snapshot: &Snapshot) -> Result<Advisory, AdvisoryError>;
}

/// Advisor that never commits to a level.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAdvisor;

impl Advisor for NoopAdvisor {
    fn advise(&self, _snapshot: &Snapshot) -> Result<Advisory, AdvisoryError> {
        Ok(Advisory {
            level: None,
            rationale: String::new(),
        })
    }
}

/// Offline advisor that restates the rule-engine decision as a short
/// operator note. Used when no remote advisor is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateAdvisor;

impl Advisor for TemplateAdvisor {
    fn advise(&self, snapshot: &Snapshot) -> Result<Advisory, AdvisoryError> {
        let decision = &snapshot.decision;
        let vel = snapshot
            .current
            .vel_mm_hr
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.3} mm/hr"));

        let mut rationale = match decision.source {
            DecisionSource::NoRule => format!(
                "{}: no rule fired (v={vel}, d={:.2} mm, thresholds {})",
                decision.level, snapshot.current.disp_mm, decision.threshold_source
            ),
            _ => format!(
                "{}: {} rule `{}` (v={vel}, d={:.2} mm, thresholds {})",
                decision.level,
                decision.source,
                decision.rule,
                snapshot.current.disp_mm,
                decision.threshold_source
            ),
        };
        if decision.elevated {
            rationale.push_str(&format!(
                "; elevated from {} by `{}`",
                decision.base_level, decision.rule
            ));
        }
        if !decision.threshold_source.is_adaptive() {
            rationale.push_str("; no adaptive thresholds, fixed rules only");
        }
        if decision.insufficient_data {
            rationale.push_str("; velocity undefined, velocity rules skipped");
        }

        Ok(Advisory {
            level: Some(decision.level),
            rationale,
        })
    }
}

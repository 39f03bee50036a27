//! Hand-written advisors with controlled failure modes.

use geowatch_monitor::{Advisor, AdvisoryError, Advisory};
use geowatch_summary::Snapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Blocks for `delay` before agreeing with the rule engine.
pub struct SlowAdvisor {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowAdvisor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Advisor for SlowAdvisor {
    fn advise(&self, snapshot: &Snapshot) -> Result<Advisory, AdvisoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Advisory {
            level: Some(snapshot.level()),
            rationale: "slow".to_string(),
        })
    }
}

/// Always fails, as an unreachable remote would.
pub struct FailingAdvisor;

impl Advisor for FailingAdvisor {
    fn advise(&self, _snapshot: &Snapshot) -> Result<Advisory, AdvisoryError> {
        Err(AdvisoryError::Failed("connection reset by peer".to_string()))
    }
}

/// Panics inside the blocking task.
pub struct PanickingAdvisor;

impl Advisor for PanickingAdvisor {
    fn advise(&self, _snapshot: &Snapshot) -> Result<Advisory, AdvisoryError> {
        panic!("advisor bug");
    }
}

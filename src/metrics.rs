//! Metrics model (component K).
//!
//! A plain snapshot over the `AtomicU64` counters each component already
//! keeps ([`crate::rate_limiter::gate::GateCounters`],
//! [`crate::task::SupervisedTaskMetrics`]) — the "bare minimum"
//! observability spec.md 4.C/4.D's counter language implies, without a
//! metrics-exporter crate (out of scope per spec.md §1's "monitoring
//! dashboards" exclusion: the counters exist, the dashboard does not).

use std::sync::atomic::Ordering;

use crate::rate_limiter::gate::GateCounters;
use crate::task::SupervisedTaskMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateSnapshot {
    pub rejected: u64,
    pub candidates: u64,
    pub admitted_privileged: u64,
}

impl From<&GateCounters> for GateSnapshot {
    fn from(c: &GateCounters) -> Self {
        Self {
            rejected: c.rejected.load(Ordering::Relaxed),
            candidates: c.candidates.load(Ordering::Relaxed),
            admitted_privileged: c.admitted_privileged.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupervisorSnapshot {
    pub successes: u64,
    pub timeouts: u64,
    pub rejections: u64,
    pub other_errors: u64,
}

impl From<&SupervisedTaskMetrics> for SupervisorSnapshot {
    fn from(m: &SupervisedTaskMetrics) -> Self {
        Self {
            successes: m.successes.load(Ordering::Relaxed),
            timeouts: m.timeouts.load(Ordering::Relaxed),
            rejections: m.rejections.load(Ordering::Relaxed),
            other_errors: m.other_errors.load(Ordering::Relaxed),
        }
    }
}

/// Log a one-line summary of the given component's counters, at the
/// density river uses for cache-miss-equivalent events: one line per
/// observation, not per call.
pub fn log_gate_snapshot(label: &str, counters: &GateCounters) {
    let snap = GateSnapshot::from(counters);
    tracing::info!(
        component = label,
        rejected = snap.rejected,
        candidates = snap.candidates,
        admitted_privileged = snap.admitted_privileged,
        "gate counters"
    );
}

pub fn log_supervisor_snapshot(label: &str, metrics: &SupervisedTaskMetrics) {
    let snap = SupervisorSnapshot::from(metrics);
    tracing::info!(
        component = label,
        successes = snap.successes,
        timeouts = snap.timeouts,
        rejections = snap.rejections,
        other_errors = snap.other_errors,
        "supervised task counters"
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gate_snapshot_reads_current_values() {
        let counters = GateCounters::default();
        counters.rejected.fetch_add(3, Ordering::Relaxed);
        let snap = GateSnapshot::from(&counters);
        assert_eq!(snap.rejected, 3);
        assert_eq!(snap.candidates, 0);
    }
}

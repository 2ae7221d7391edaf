//! Component O (SPEC_FULL §4.O): process-wide counters, logged on a
//! periodic interval. Plain atomics behind a struct, no external metrics
//! backend — this system's non-goals exclude a full metrics surface, but
//! ambient observability still goes through `tracing` like everything
//! else in this crate.

use crate::constants::METRICS_LOG_INTERVAL_SECS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct Metrics {
    pub tasks_submitted: AtomicU64,
    pub claim_attempts: AtomicU64,
    pub claim_contention: AtomicU64,
    pub stale_agent_sweeps: AtomicU64,
    pub shell_timeouts: AtomicU64,
}

pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub claim_attempts: u64,
    pub claim_contention: u64,
    pub stale_agent_sweeps: u64,
    pub shell_timeouts: u64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            claim_attempts: self.claim_attempts.load(Ordering::Relaxed),
            claim_contention: self.claim_contention.load(Ordering::Relaxed),
            stale_agent_sweeps: self.stale_agent_sweeps.load(Ordering::Relaxed),
            shell_timeouts: self.shell_timeouts.load(Ordering::Relaxed),
        }
    }

    pub async fn run_logger(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(METRICS_LOG_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {
                    let snapshot = self.snapshot();
                    tracing::info!(
                        tasks_submitted = snapshot.tasks_submitted,
                        claim_attempts = snapshot.claim_attempts,
                        claim_contention = snapshot.claim_contention,
                        stale_agent_sweeps = snapshot.stale_agent_sweeps,
                        shell_timeouts = snapshot.shell_timeouts,
                        "metrics snapshot",
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = Metrics::new();
        metrics.tasks_submitted.fetch_add(3, Ordering::Relaxed);
        metrics.claim_contention.fetch_add(1, Ordering::Relaxed);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_submitted, 3);
        assert_eq!(snapshot.claim_contention, 1);
    }
}

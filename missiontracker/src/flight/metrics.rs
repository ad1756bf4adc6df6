//! Lock-free engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between an engine task and observers.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    passes: AtomicU64,
    operations_started: AtomicU64,
    operations_succeeded: AtomicU64,
    operations_failed: AtomicU64,
}

impl EngineMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a pass.
    pub fn pass_started(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an outbound operation being issued.
    pub fn operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation outcome.
    pub fn operation_finished(&self, success: bool) {
        if success {
            self.operations_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.operations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            operations_started: self.operations_started.load(Ordering::Relaxed),
            operations_succeeded: self.operations_succeeded.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`EngineMetrics`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Passes started.
    pub passes: u64,
    /// Operations issued to collaborators.
    pub operations_started: u64,
    /// Operations that succeeded.
    pub operations_succeeded: u64,
    /// Operations that failed.
    pub operations_failed: u64,
}

impl MetricsSnapshot {
    /// Operations issued but not yet settled.
    pub fn operations_pending(&self) -> u64 {
        self.operations_started
            .saturating_sub(self.operations_succeeded + self.operations_failed)
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} passes, {} ops ({} ok, {} failed)",
            self.passes, self.operations_started, self.operations_succeeded, self.operations_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = EngineMetrics::new();
        metrics.pass_started();
        metrics.operation_started();
        metrics.operation_started();
        metrics.operation_finished(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.passes, 1);
        assert_eq!(snapshot.operations_started, 2);
        assert_eq!(snapshot.operations_succeeded, 1);
        assert_eq!(snapshot.operations_pending(), 1);
    }
}

//! Dispatch metrics for observability
//!
//! Local counters mirror what is pushed to the `metrics` facade so callers and
//! tests can read them back without installing a recorder.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Counters shared by the registry, sender and coordinator
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Beacons handed to the transport
    fired_count: AtomicU64,
    /// Beacons whose request is done with (load, error or abort)
    settled_count: AtomicU64,
    /// Backends skipped by sampling
    sampled_out_count: AtomicU64,
    /// Backends that failed or produced malformed URLs
    failure_count: AtomicU64,
    /// Deferred clicks completed because every beacon settled
    settled_navigations: AtomicU64,
    /// Deferred clicks completed by the deadline
    deadline_navigations: AtomicU64,
    /// Holding batches replaced by a newer click
    superseded_count: AtomicU64,
    /// Woken on every settle
    settle_notify: Notify,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fired(&self) {
        self.fired_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_settled(&self) {
        self.settled_count.fetch_add(1, Ordering::Release);
        self.settle_notify.notify_waiters();
    }

    pub fn inc_sampled_out(&self) {
        self.sampled_out_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_settled_navigation(&self) {
        self.settled_navigations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deadline_navigation(&self) {
        self.deadline_navigations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_superseded(&self) {
        self.superseded_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolve once no fired beacon is left unsettled
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.settle_notify.notified();
            tokio::pin!(notified);
            // Register before checking so a settle in between is not missed
            notified.as_mut().enable();
            if self.snapshot().in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fired: self.fired_count.load(Ordering::Relaxed),
            settled: self.settled_count.load(Ordering::Acquire),
            sampled_out: self.sampled_out_count.load(Ordering::Relaxed),
            failures: self.failure_count.load(Ordering::Relaxed),
            settled_navigations: self.settled_navigations.load(Ordering::Relaxed),
            deadline_navigations: self.deadline_navigations.load(Ordering::Relaxed),
            superseded: self.superseded_count.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fired: u64,
    pub settled: u64,
    pub sampled_out: u64,
    pub failures: u64,
    pub settled_navigations: u64,
    pub deadline_navigations: u64,
    pub superseded: u64,
}

impl MetricsSnapshot {
    /// Navigations completed by either path
    pub fn navigations(&self) -> u64 {
        self.settled_navigations + self.deadline_navigations
    }

    /// Beacons still in flight
    pub fn in_flight(&self) -> u64 {
        self.fired.saturating_sub(self.settled)
    }
}

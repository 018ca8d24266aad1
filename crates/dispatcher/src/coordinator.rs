//! NavigationCoordinator - holds a click's navigation until its beacons settle
//!
//! ## State machine
//!
//! ```text
//! Holding --(all beacons settled | deadline)--> Navigated
//!    |  \
//!    |   +--(all settled early, wait out remainder)--> WaitingOut --(deadline)--> Navigated
//!    |                                                     |
//!    +--(newer click begins)--> Superseded <---------------+
//! ```
//!
//! Every transition is a single compare-and-swap; whichever completion path wins
//! performs the navigation, every other path (the loser of the race, late settles
//! of a superseded batch) is a no-op. A `WaitingOut` batch is navigated only by its
//! deadline task, which superseding aborts.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ClickEvent, DeferralConfig, EventKind, Navigator};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

use crate::metrics::DispatchMetrics;

const HOLDING: u8 = 0;
const NAVIGATED: u8 = 1;
const SUPERSEDED: u8 = 2;
const WAITING_OUT: u8 = 3;

/// Lifecycle of one deferred click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Navigation held, beacons in flight
    Holding,
    /// Every beacon settled early; navigation waits for the deadline
    WaitingOut,
    /// Completion ran; navigation performed (unless the event never navigates)
    Navigated,
    /// Replaced by a newer click before completing; never navigates
    Superseded,
}

/// Which path completed the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// Pending count reached zero before the deadline
    AllSettled,
    /// Deadline elapsed first
    Deadline,
}

impl CompletionTrigger {
    fn as_str(self) -> &'static str {
        match self {
            CompletionTrigger::AllSettled => "all_settled",
            CompletionTrigger::Deadline => "deadline",
        }
    }
}

/// Beacons fired for one deferred click
pub struct BeaconBatch {
    id: u64,
    target_url: String,
    event_kind: EventKind,
    pending: AtomicUsize,
    state: AtomicU8,
    started_at: Instant,
    deadline_at: Instant,
    wait_out_remainder: bool,
    timer: Mutex<Option<JoinHandle<()>>>,
    navigator: Arc<dyn Navigator>,
    metrics: Arc<DispatchMetrics>,
}

impl BeaconBatch {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Beacons (plus the arming ticket while dispatch runs) not yet settled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn deadline_at(&self) -> Instant {
        self.deadline_at
    }

    pub fn state(&self) -> BatchState {
        match self.state.load(Ordering::Acquire) {
            HOLDING => BatchState::Holding,
            NAVIGATED => BatchState::Navigated,
            WAITING_OUT => BatchState::WaitingOut,
            _ => BatchState::Superseded,
        }
    }

    /// True once the batch reached a terminal state
    pub fn is_resolved(&self) -> bool {
        matches!(self.state(), BatchState::Navigated | BatchState::Superseded)
    }

    /// Count one more beacon against this batch
    ///
    /// The returned ticket settles the beacon when dropped.
    pub fn ticket(self: &Arc<Self>) -> BeaconTicket {
        self.pending.fetch_add(1, Ordering::AcqRel);
        BeaconTicket {
            batch: Arc::clone(self),
        }
    }

    fn on_beacon_settled(&self) {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(1))
            .unwrap_or(0);
        let remaining = previous.saturating_sub(1);

        debug!(batch = self.id, remaining, "Beacon settled");
        if remaining == 0 {
            // A settle observed after the deadline is a timeout, whatever the timer did
            let trigger = if Instant::now() >= self.deadline_at {
                CompletionTrigger::Deadline
            } else {
                CompletionTrigger::AllSettled
            };
            self.complete(trigger);
        }
    }

    fn on_deadline(&self) {
        if self
            .state
            .compare_exchange(WAITING_OUT, NAVIGATED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.clear_timer(false);
            self.record_navigation(CompletionTrigger::AllSettled);
            info!(batch = self.id, url = %self.target_url, "Remainder waited out, navigating");
            self.navigator.navigate(&self.target_url);
            return;
        }
        self.complete(CompletionTrigger::Deadline);
    }

    /// The single completion routine shared by the settle and deadline paths
    fn complete(&self, trigger: CompletionTrigger) {
        let now = Instant::now();
        let wait_out = trigger == CompletionTrigger::AllSettled
            && now < self.deadline_at
            && self.wait_out_remainder
            && self.event_kind.is_navigating();
        let next = if wait_out { WAITING_OUT } else { NAVIGATED };

        if self
            .state
            .compare_exchange(HOLDING, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(batch = self.id, trigger = trigger.as_str(), "Batch already resolved");
            return;
        }

        if wait_out {
            // The deadline task performs the navigation
            info!(
                batch = self.id,
                url = %self.target_url,
                remaining_ms = (self.deadline_at - now).as_millis() as u64,
                "All beacons settled, navigating at deadline"
            );
            return;
        }

        self.clear_timer(trigger == CompletionTrigger::AllSettled);
        let hold_ms = self.record_navigation(trigger);

        if !self.event_kind.is_navigating() {
            debug!(batch = self.id, kind = %self.event_kind, "Non-navigating event");
            return;
        }

        info!(
            batch = self.id,
            url = %self.target_url,
            trigger = trigger.as_str(),
            hold_ms,
            "Navigating"
        );
        self.navigator.navigate(&self.target_url);
    }

    fn record_navigation(&self, trigger: CompletionTrigger) -> f64 {
        let hold_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        match trigger {
            CompletionTrigger::AllSettled => self.metrics.inc_settled_navigation(),
            CompletionTrigger::Deadline => self.metrics.inc_deadline_navigation(),
        }
        observability::record_navigation(trigger.as_str(), hold_ms);
        hold_ms
    }

    /// Mark a batch that has not navigated superseded; returns whether it was
    fn supersede(&self) -> bool {
        let superseded = [HOLDING, WAITING_OUT].into_iter().any(|from| {
            self.state
                .compare_exchange(from, SUPERSEDED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        });
        if superseded {
            self.clear_timer(true);
            self.metrics.inc_superseded();
            observability::record_batch_superseded();
            debug!(batch = self.id, pending = self.pending(), "Batch superseded");
        }
        superseded
    }

    /// Drop the deadline task handle; `abort` when the timer is not the caller
    fn clear_timer(&self, abort: bool) {
        let handle = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(handle), true) = (handle, abort) {
            handle.abort();
        }
    }
}

/// One unit of pending work in a batch; settles on drop
pub struct BeaconTicket {
    batch: Arc<BeaconBatch>,
}

impl BeaconTicket {
    /// Settle explicitly (same as dropping)
    pub fn settle(self) {}

    pub fn batch(&self) -> &Arc<BeaconBatch> {
        &self.batch
    }
}

impl Drop for BeaconTicket {
    fn drop(&mut self) {
        self.batch.on_beacon_settled();
    }
}

/// A batch whose beacons are still being dispatched
///
/// Holds the arming ticket so the batch cannot complete until every beacon of
/// the dispatch has been counted. Release it once dispatch returns.
pub struct HeldClick {
    batch: Arc<BeaconBatch>,
    arming: BeaconTicket,
}

impl HeldClick {
    pub fn batch(&self) -> &Arc<BeaconBatch> {
        &self.batch
    }

    /// Finish arming; with nothing in flight the batch completes right here
    pub fn release(self) -> Arc<BeaconBatch> {
        let HeldClick { batch, arming } = self;
        arming.settle();
        batch
    }
}

/// Owns the live batch and starts new ones
pub struct NavigationCoordinator {
    config: DeferralConfig,
    navigator: Arc<dyn Navigator>,
    runtime: Handle,
    metrics: Arc<DispatchMetrics>,
    current: Mutex<Option<Arc<BeaconBatch>>>,
    next_id: AtomicU64,
}

impl NavigationCoordinator {
    pub fn new(
        config: DeferralConfig,
        navigator: Arc<dyn Navigator>,
        runtime: Handle,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            config,
            navigator,
            runtime,
            metrics,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Most recent batch, if any
    pub fn current(&self) -> Option<Arc<BeaconBatch>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hold `event`'s navigation to `target_url`
    ///
    /// Returns `None` when the event's default action was already prevented
    /// (someone else resolved this click). Otherwise prevents the default action,
    /// supersedes any batch still holding and starts the deadline timer.
    #[instrument(name = "coordinator_begin", skip(self, event), fields(kind = %event.kind))]
    pub fn begin(&self, event: &mut ClickEvent, target_url: &str) -> Option<HeldClick> {
        if event.default_prevented() {
            debug!("Default already prevented, not holding");
            return None;
        }
        event.prevent_default();

        let started_at = Instant::now();
        let batch = Arc::new(BeaconBatch {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            target_url: target_url.to_string(),
            event_kind: event.kind,
            pending: AtomicUsize::new(0),
            state: AtomicU8::new(HOLDING),
            started_at,
            deadline_at: started_at + self.config.deadline(),
            wait_out_remainder: self.config.wait_out_remainder,
            timer: Mutex::new(None),
            navigator: Arc::clone(&self.navigator),
            metrics: Arc::clone(&self.metrics),
        });

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::clone(&batch));
        if let Some(previous) = previous {
            previous.supersede();
        }

        let timer_batch = Arc::clone(&batch);
        let deadline_at = batch.deadline_at;
        let timer = self.runtime.spawn(async move {
            sleep_until(deadline_at).await;
            timer_batch.on_deadline();
        });
        *batch.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(timer);

        debug!(
            batch = batch.id,
            url = %target_url,
            deadline_ms = self.config.deadline_ms,
            "Navigation held"
        );

        let arming = batch.ticket();
        Some(HeldClick { batch, arming })
    }
}

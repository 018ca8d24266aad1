//! BeaconSender - fires one beacon per call on the host runtime
//!
//! Each beacon runs in its own task. The task owns a [`SettleGuard`]; when the
//! task finishes, fails, panics or is aborted the guard drops and reports
//! settlement exactly once. There is no success/failure distinction for a beacon.

use std::sync::Arc;

use contracts::BeaconTransport;
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use crate::metrics::DispatchMetrics;

type SettleCallback = Box<dyn FnOnce() + Send + 'static>;

/// Reports settlement of one beacon when dropped
pub struct SettleGuard {
    metrics: Arc<DispatchMetrics>,
    on_settled: Option<SettleCallback>,
}

impl SettleGuard {
    fn new(metrics: Arc<DispatchMetrics>, on_settled: Option<SettleCallback>) -> Self {
        Self {
            metrics,
            on_settled,
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.metrics.inc_settled();
        observability::record_beacon_settled();
        if let Some(callback) = self.on_settled.take() {
            callback();
        }
    }
}

/// Fires beacons through a transport
pub struct BeaconSender<T> {
    transport: Arc<T>,
    runtime: Handle,
    metrics: Arc<DispatchMetrics>,
}

impl<T> BeaconSender<T>
where
    T: BeaconTransport + Sync + 'static,
{
    /// Create a sender spawning onto `runtime`
    pub fn new(transport: T, runtime: Handle, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            transport: Arc::new(transport),
            runtime,
            metrics,
        }
    }

    /// Transport in use
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Fire a beacon without observing its outcome
    #[instrument(name = "beacon_fire_simple", skip(self), fields(transport = %self.transport.name()))]
    pub fn fire_simple(&self, url: &str) {
        observability::record_beacon_fired(observability::metrics::MODE_SIMPLE);
        self.spawn(url, None);
    }

    /// Fire a beacon; `on_settled` runs exactly once when the request is done with
    #[instrument(
        name = "beacon_fire_acknowledged",
        skip(self, on_settled),
        fields(transport = %self.transport.name())
    )]
    pub fn fire_acknowledged<F>(&self, url: &str, on_settled: F)
    where
        F: FnOnce() + Send + 'static,
    {
        observability::record_beacon_fired(observability::metrics::MODE_ACKNOWLEDGED);
        self.spawn(url, Some(Box::new(on_settled)));
    }

    fn spawn(&self, url: &str, on_settled: Option<SettleCallback>) {
        self.metrics.inc_fired();
        let url = unescape_ampersands(url);
        let transport = Arc::clone(&self.transport);
        let guard = SettleGuard::new(Arc::clone(&self.metrics), on_settled);

        self.runtime.spawn(async move {
            let _guard = guard;
            match transport.send(&url).await {
                Ok(()) => debug!(transport = %transport.name(), url = %url, "Beacon loaded"),
                Err(e) => debug!(
                    transport = %transport.name(),
                    url = %url,
                    error = %e,
                    "Beacon errored"
                ),
            }
        });
    }
}

/// Undo HTML-entity encoding of ampersands left by attribute extraction
pub fn unescape_ampersands(url: &str) -> String {
    url.replace("&amp;", "&")
}

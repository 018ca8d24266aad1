//! TrackerRegistry - ordered set of backends, fan-out of one tracking request
//!
//! Each backend is isolated: an error, a malformed URL or a panic while computing
//! a URL skips that backend only.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{is_beacon_url, BeaconTransport, ContractError, TrackingBackend, TrackingRequest};
use tracing::{debug, instrument, warn};

use crate::coordinator::BeaconBatch;
use crate::metrics::DispatchMetrics;
use crate::sampling::SamplingDecision;
use crate::sender::BeaconSender;

/// How the URLs produced by a dispatch are fired
#[derive(Clone, Copy)]
pub enum Delivery<'a> {
    /// Fire and forget
    Simple,
    /// Count each beacon against a deferred click's batch
    Acknowledged(&'a Arc<BeaconBatch>),
}

/// Outcome of one dispatch call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Beacons handed to the sender
    pub fired: usize,
    /// Backends excluded by sampling
    pub sampled_out: usize,
    /// Backends that returned an empty URL
    pub empty: usize,
    /// Backends that failed or returned a malformed URL
    pub failed: usize,
}

struct RegisteredBackend {
    backend: Arc<dyn TrackingBackend>,
    sampling_rate: u8,
}

/// Registered backends in registration order
pub struct TrackerRegistry {
    backends: RwLock<Vec<Arc<RegisteredBackend>>>,
    default_rate: u8,
    event_count: AtomicU64,
    metrics: Arc<DispatchMetrics>,
}

impl TrackerRegistry {
    /// Create an empty registry; `default_rate` replaces missing/invalid rates
    pub fn new(default_rate: u8, metrics: Arc<DispatchMetrics>) -> Self {
        Self {
            backends: RwLock::new(Vec::new()),
            default_rate: default_rate.min(100),
            event_count: AtomicU64::new(0),
            metrics,
        }
    }

    /// Append a backend; returns the effective sampling rate
    #[instrument(name = "registry_register", skip(self, backend), fields(backend = %backend.name()))]
    pub fn register(&self, backend: Arc<dyn TrackingBackend>) -> u8 {
        let sampling_rate = match backend.sampling_rate() {
            Some(rate) if (0..=100).contains(&rate) => rate as u8,
            declared => {
                if declared.is_some() {
                    warn!(
                        backend = %backend.name(),
                        declared = ?declared,
                        default = self.default_rate,
                        "Invalid sampling rate, using default"
                    );
                }
                self.default_rate
            }
        };

        debug!(backend = %backend.name(), sampling_rate, "Backend registered");
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(RegisteredBackend {
                backend,
                sampling_rate,
            }));
        sampling_rate
    }

    /// Number of registered backends
    pub fn len(&self) -> usize {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic count of dispatch calls
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Fan `request` out to every backend in the sampling bucket
    ///
    /// Backends are visited in registration order; completion order of the
    /// resulting beacons is unspecified.
    #[instrument(
        name = "registry_dispatch",
        skip(self, delivery, sender, sampling),
        fields(request = %request)
    )]
    pub fn dispatch<T>(
        &self,
        request: TrackingRequest,
        delivery: Delivery<'_>,
        sender: &BeaconSender<T>,
        sampling: &SamplingDecision,
    ) -> DispatchReport
    where
        T: BeaconTransport + Sync + 'static,
    {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        observability::record_dispatch(&request.to_string());

        // Snapshot so a backend may register others without deadlocking
        let backends: Vec<Arc<RegisteredBackend>> = self
            .backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let bucket = sampling.sample();
        let mut report = DispatchReport::default();

        for entry in &backends {
            let name = entry.backend.name();
            if !sampling.is_sampled(entry.sampling_rate) {
                report.sampled_out += 1;
                self.metrics.inc_sampled_out();
                observability::record_sampled_out(name);
                continue;
            }

            let url = match compute_url(entry.backend.as_ref(), request) {
                Ok(url) => url,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.inc_failure();
                    observability::record_backend_failure(name);
                    warn!(backend = %name, error = %e, "Backend skipped");
                    continue;
                }
            };

            let Some(url) = url else {
                report.empty += 1;
                continue;
            };

            match delivery {
                Delivery::Simple => sender.fire_simple(&url),
                Delivery::Acknowledged(batch) => {
                    let ticket = batch.ticket();
                    sender.fire_acknowledged(&url, move || ticket.settle());
                }
            }
            report.fired += 1;
        }

        debug!(
            bucket,
            fired = report.fired,
            sampled_out = report.sampled_out,
            failed = report.failed,
            "Dispatch complete"
        );
        report
    }
}

/// Ask one backend for its URL; `Ok(None)` means "do not fire"
fn compute_url(
    backend: &dyn TrackingBackend,
    request: TrackingRequest,
) -> Result<Option<String>, ContractError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| match request {
        TrackingRequest::PageView => backend.page_view_tracking_url(),
        TrackingRequest::Event(kind) => backend.event_tracking_url(kind),
    }))
    .map_err(|payload| ContractError::backend(backend.name(), panic_message(payload.as_ref())))?;

    let url = result?;
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    if !is_beacon_url(url) {
        return Err(ContractError::MalformedUrl {
            backend: backend.name().to_string(),
            url: url.to_string(),
        });
    }
    Ok(Some(url.to_string()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryCookieJar;
    use contracts::{EventKind, SamplingConfig};
    use std::sync::Mutex;
    use tokio::runtime::Handle;
    use tokio::time::{sleep, Duration};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    impl BeaconTransport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, url: &str) -> Result<(), ContractError> {
            self.sent.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    enum Behavior {
        Url(&'static str),
        Fail,
        Panic,
    }

    struct TestBackend {
        name: &'static str,
        rate: Option<i64>,
        behavior: Behavior,
    }

    impl TestBackend {
        fn url(name: &'static str, url: &'static str) -> Self {
            Self {
                name,
                rate: None,
                behavior: Behavior::Url(url),
            }
        }
    }

    impl TrackingBackend for TestBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn sampling_rate(&self) -> Option<i64> {
            self.rate
        }

        fn event_tracking_url(&self, event: EventKind) -> Result<String, ContractError> {
            match self.behavior {
                Behavior::Url(url) if url.is_empty() => Ok(String::new()),
                Behavior::Url(url) => Ok(format!("{url}?e={event}")),
                Behavior::Fail => Err(ContractError::backend(self.name, "no page id")),
                Behavior::Panic => panic!("backend exploded"),
            }
        }

        fn page_view_tracking_url(&self) -> Result<String, ContractError> {
            match self.behavior {
                Behavior::Url(url) => Ok(url.to_string()),
                Behavior::Fail => Err(ContractError::backend(self.name, "no page id")),
                Behavior::Panic => panic!("backend exploded"),
            }
        }
    }

    struct Fixture {
        registry: TrackerRegistry,
        sender: BeaconSender<RecordingTransport>,
        sampling: SamplingDecision,
        metrics: Arc<DispatchMetrics>,
    }

    fn fixture(bucket: u8) -> Fixture {
        let metrics = Arc::new(DispatchMetrics::new());
        let jar = Arc::new(MemoryCookieJar::new("example.com").with_cookie("trk_sample", bucket.to_string()));
        Fixture {
            registry: TrackerRegistry::new(99, Arc::clone(&metrics)),
            sender: BeaconSender::new(
                RecordingTransport::default(),
                Handle::current(),
                Arc::clone(&metrics),
            ),
            sampling: SamplingDecision::new(SamplingConfig::default(), jar),
            metrics,
        }
    }

    impl Fixture {
        fn dispatch(&self, request: TrackingRequest) -> DispatchReport {
            self.registry
                .dispatch(request, Delivery::Simple, &self.sender, &self.sampling)
        }

        async fn sent(&self) -> Vec<String> {
            sleep(Duration::from_millis(10)).await;
            let mut sent = self.sender.transport().sent.lock().unwrap().clone();
            sent.sort();
            sent
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_rate() {
        let f = fixture(0);
        let mut backend = TestBackend::url("a", "https://a.example.com/pv");
        assert_eq!(f.registry.register(Arc::new(backend)), 99);

        backend = TestBackend::url("b", "https://b.example.com/pv");
        backend.rate = Some(250);
        assert_eq!(f.registry.register(Arc::new(backend)), 99);

        backend = TestBackend::url("c", "https://c.example.com/pv");
        backend.rate = Some(-5);
        assert_eq!(f.registry.register(Arc::new(backend)), 99);

        backend = TestBackend::url("d", "https://d.example.com/pv");
        backend.rate = Some(0);
        assert_eq!(f.registry.register(Arc::new(backend)), 0);
        assert_eq!(f.registry.len(), 4);
    }

    #[tokio::test]
    async fn test_dispatch_fans_out_to_all() {
        let f = fixture(10);
        f.registry.register(Arc::new(TestBackend::url("a", "https://a.example.com/e")));
        f.registry.register(Arc::new(TestBackend::url("b", "https://b.example.com/e")));

        let report = f.dispatch(TrackingRequest::Event(EventKind::Click));
        assert_eq!(report.fired, 2);
        assert_eq!(
            f.sent().await,
            vec![
                "https://a.example.com/e?e=click".to_string(),
                "https://b.example.com/e?e=click".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_backends_are_isolated() {
        let f = fixture(10);
        f.registry.register(Arc::new(TestBackend {
            name: "failing",
            rate: None,
            behavior: Behavior::Fail,
        }));
        f.registry.register(Arc::new(TestBackend {
            name: "panicking",
            rate: None,
            behavior: Behavior::Panic,
        }));
        f.registry.register(Arc::new(TestBackend::url("malformed", "not a url")));
        f.registry.register(Arc::new(TestBackend::url("ok", "https://ok.example.com/pv")));

        let report = f.dispatch(TrackingRequest::PageView);
        assert_eq!(report.failed, 3);
        assert_eq!(report.fired, 1);
        assert_eq!(f.metrics.snapshot().failures, 3);
        assert_eq!(f.sent().await, vec!["https://ok.example.com/pv".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_url_is_skipped() {
        let f = fixture(10);
        f.registry.register(Arc::new(TestBackend::url("quiet", "")));

        let report = f.dispatch(TrackingRequest::PageView);
        assert_eq!(report, DispatchReport { empty: 1, ..DispatchReport::default() });
        assert!(f.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_rate_fires_only_in_bucket_zero() {
        for (bucket, expected) in [(0u8, 1usize), (1, 0), (50, 0)] {
            let f = fixture(bucket);
            let mut backend = TestBackend::url("rare", "https://rare.example.com/pv");
            backend.rate = Some(0);
            f.registry.register(Arc::new(backend));

            let report = f.dispatch(TrackingRequest::PageView);
            assert_eq!(report.fired, expected, "bucket={bucket}");
            assert_eq!(report.sampled_out, 1 - expected, "bucket={bucket}");
        }
    }

    #[tokio::test]
    async fn test_dispatch_follows_sampling_predicate() {
        let f = fixture(40);
        for (name, rate) in [("below", 39), ("equal", 40), ("above", 41)] {
            let mut backend = TestBackend::url(name, "https://s.example.com/pv");
            backend.rate = Some(rate);
            f.registry.register(Arc::new(backend));
        }

        let report = f.dispatch(TrackingRequest::PageView);
        assert_eq!(report.sampled_out, 1);
        assert_eq!(report.fired, 2);
        assert!(!f.sampling.is_sampled(39));
        assert!(f.sampling.is_sampled(40));
        assert_eq!(f.metrics.snapshot().sampled_out, 1);
    }

    #[tokio::test]
    async fn test_default_rate_covers_every_bucket() {
        for bucket in [0u8, 42, 99] {
            let f = fixture(bucket);
            f.registry.register(Arc::new(TestBackend::url("a", "https://a.example.com/pv")));
            assert_eq!(f.dispatch(TrackingRequest::PageView).fired, 1, "bucket={bucket}");
        }
    }

    #[tokio::test]
    async fn test_event_count_is_monotonic() {
        let f = fixture(99);
        let mut backend = TestBackend::url("rare", "https://rare.example.com/pv");
        backend.rate = Some(0);
        f.registry.register(Arc::new(backend));

        assert_eq!(f.registry.event_count(), 0);
        f.dispatch(TrackingRequest::PageView);
        f.dispatch(TrackingRequest::Event(EventKind::Submit));
        // Counted even though sampling excluded every backend
        assert_eq!(f.registry.event_count(), 2);
    }
}

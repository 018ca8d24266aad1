//! Dispatcher - page-lifetime owner of every tracking component
//!
//! One instance per page: it owns the backend registry, the sampling bucket, the
//! eligibility decision and the navigation coordinator. Nothing is global, so a
//! fresh instance per test is a fresh page.

use std::sync::Arc;
use std::time::Duration;

use config_loader::ConfigLoader;
use contracts::{
    BeaconTransport, CapabilityProbe, ClickEvent, CookieJar, EventKind, Navigator,
    TargetResolver, TrackerConfig, TrackingBackend, TrackingRequest,
};
use rand::RngCore;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use crate::backends::StaticBackend;
use crate::classifier::{classify, ClickDecision, SkipReason};
use crate::coordinator::NavigationCoordinator;
use crate::eligibility::EligibilityPolicy;
use crate::error::DispatcherError;
use crate::host::{LogNavigator, MemoryCookieJar, NoTargets, StaticCapabilities};
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::registry::{Delivery, DispatchReport, TrackerRegistry};
use crate::sampling::SamplingDecision;
use crate::sender::BeaconSender;

/// What happened to a click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Navigation held; the coordinator will navigate exactly once
    Deferred { batch_id: u64 },
    /// Click not eligible; beacons fired, default action untouched
    Ineligible(SkipReason),
    /// Click eligible but deferral is off for this page
    HoldDisabled,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder<T> {
    config: TrackerConfig,
    transport: T,
    navigator: Option<Arc<dyn Navigator>>,
    cookie_jar: Option<Arc<dyn CookieJar>>,
    probe: Option<Arc<dyn CapabilityProbe>>,
    resolver: Option<Arc<dyn TargetResolver>>,
    rng: Option<Box<dyn RngCore + Send>>,
    runtime: Option<Handle>,
}

impl<T> DispatcherBuilder<T>
where
    T: BeaconTransport + Sync + 'static,
{
    /// Create a new DispatcherBuilder
    pub fn new(config: TrackerConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            navigator: None,
            cookie_jar: None,
            probe: None,
            resolver: None,
            rng: None,
            runtime: None,
        }
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn cookie_jar(mut self, cookie_jar: Arc<dyn CookieJar>) -> Self {
        self.cookie_jar = Some(cookie_jar);
        self
    }

    pub fn capability_probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn target_resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// RNG used when no sampling cookie exists
    pub fn rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Some(Box::new(rng));
        self
    }

    /// Runtime to spawn beacons and timers on (defaults to the current one)
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validate configuration and build the dispatcher
    ///
    /// # Errors
    /// - Invalid configuration
    /// - No runtime supplied and none current
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(backend_count = self.config.backends.len())
    )]
    pub fn build(self) -> Result<Dispatcher<T>, DispatcherError> {
        ConfigLoader::validate(&self.config)?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()?,
        };
        let metrics = Arc::new(DispatchMetrics::new());
        let config = self.config;

        let cookie_jar = self
            .cookie_jar
            .unwrap_or_else(|| Arc::new(MemoryCookieJar::default()));
        let sampling = match self.rng {
            Some(rng) => SamplingDecision::with_rng(config.sampling.clone(), cookie_jar, rng),
            None => SamplingDecision::new(config.sampling.clone(), cookie_jar),
        };

        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(StaticCapabilities::default()));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));

        let dispatcher = Dispatcher {
            registry: TrackerRegistry::new(config.sampling.default_rate, Arc::clone(&metrics)),
            sampling,
            sender: BeaconSender::new(self.transport, runtime.clone(), Arc::clone(&metrics)),
            eligibility: EligibilityPolicy::new(&config.deferral, probe),
            coordinator: NavigationCoordinator::new(
                config.deferral.clone(),
                navigator,
                runtime,
                Arc::clone(&metrics),
            ),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(NoTargets)),
            metrics,
        };

        for backend_config in &config.backends {
            let backend = StaticBackend::from_config(backend_config)?;
            dispatcher.register(Arc::new(backend));
        }

        info!(
            backends = dispatcher.registry.len(),
            deadline_ms = config.deferral.deadline_ms,
            "Dispatcher ready"
        );
        Ok(dispatcher)
    }
}

/// Fans tracking requests out to backends and holds navigating clicks
pub struct Dispatcher<T> {
    registry: TrackerRegistry,
    sampling: SamplingDecision,
    sender: BeaconSender<T>,
    eligibility: EligibilityPolicy,
    coordinator: NavigationCoordinator,
    resolver: Arc<dyn TargetResolver>,
    metrics: Arc<DispatchMetrics>,
}

impl<T> Dispatcher<T>
where
    T: BeaconTransport + Sync + 'static,
{
    /// Start building a dispatcher
    pub fn builder(config: TrackerConfig, transport: T) -> DispatcherBuilder<T> {
        DispatcherBuilder::new(config, transport)
    }

    /// Add a backend after construction; returns its effective sampling rate
    pub fn register(&self, backend: Arc<dyn TrackingBackend>) -> u8 {
        self.registry.register(backend)
    }

    /// Report a page view to every sampled backend
    pub fn track_page_view(&self) -> DispatchReport {
        self.dispatch(TrackingRequest::PageView)
    }

    /// Report an interaction event without touching navigation
    pub fn track_event(&self, kind: EventKind) -> DispatchReport {
        self.dispatch(TrackingRequest::Event(kind))
    }

    /// Handle a click: report it, and hold its navigation when eligible
    ///
    /// Call from the host's click handler. When the outcome is `Deferred` the
    /// event's default action has been prevented and navigation will happen
    /// through the configured [`Navigator`].
    #[instrument(name = "dispatcher_handle_click", skip(self, event), fields(kind = %event.kind))]
    pub fn handle_click(&self, event: &mut ClickEvent) -> ClickOutcome {
        let request = TrackingRequest::Event(event.kind);

        let target_url = match classify(event, self.resolver.as_ref()) {
            ClickDecision::Defer { target_url } => target_url,
            ClickDecision::Skip(reason) => {
                debug!(reason = ?reason, "Click not held");
                self.dispatch(request);
                return ClickOutcome::Ineligible(reason);
            }
        };

        if !self.eligibility.hold_enabled() {
            self.dispatch(request);
            return ClickOutcome::HoldDisabled;
        }

        let Some(held) = self.coordinator.begin(event, &target_url) else {
            self.dispatch(request);
            return ClickOutcome::Ineligible(SkipReason::DefaultPrevented);
        };

        let report = self.registry.dispatch(
            request,
            Delivery::Acknowledged(held.batch()),
            &self.sender,
            &self.sampling,
        );
        let batch = held.release();

        debug!(
            batch = batch.id(),
            beacons = report.fired,
            pending = batch.pending(),
            "Click held"
        );
        ClickOutcome::Deferred {
            batch_id: batch.id(),
        }
    }

    /// Monotonic count of dispatch calls
    pub fn event_count(&self) -> u64 {
        self.registry.event_count()
    }

    /// Get dispatch metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn transport(&self) -> &Arc<T> {
        self.sender.transport()
    }

    pub fn sampling(&self) -> &SamplingDecision {
        &self.sampling
    }

    pub fn eligibility(&self) -> &EligibilityPolicy {
        &self.eligibility
    }

    pub fn coordinator(&self) -> &NavigationCoordinator {
        &self.coordinator
    }

    /// Wait until every fired beacon settled, up to `timeout`
    ///
    /// Returns `false` when beacons were still in flight at the timeout.
    pub async fn wait_settled(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.metrics.wait_idle())
            .await
            .is_ok()
    }

    fn dispatch(&self, request: TrackingRequest) -> DispatchReport {
        self.registry
            .dispatch(request, Delivery::Simple, &self.sender, &self.sampling)
    }
}

/// Convenience function to create a dispatcher with default host collaborators
pub fn create_dispatcher<T>(config: TrackerConfig, transport: T) -> Result<Dispatcher<T>, DispatcherError>
where
    T: BeaconTransport + Sync + 'static,
{
    DispatcherBuilder::new(config, transport).build()
}

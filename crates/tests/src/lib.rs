//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试：配置 -> Dispatcher -> 点击 -> 跳转（虚拟时间）

#[cfg(test)]
mod contract_tests {
    use contracts::{ConfigVersion, EventKind, TrackingRequest};

    #[test]
    fn test_contracts_compile() {
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_request_labels_are_stable() {
        assert_eq!(TrackingRequest::PageView.to_string(), "pageview");
        assert_eq!(
            TrackingRequest::Event(EventKind::MouseLeave).to_string(),
            "event:mouseleave"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        BeaconTransport, BrowserIdentity, ClickEvent, ClickTarget, ContractError, CookieJar,
        EventKind, HostCapabilities, Navigator, TargetResolver, TrackerConfig, TrackingBackend,
    };
    use dispatcher::{
        BatchState, ClickOutcome, Dispatcher, MemoryCookieJar, SkipReason, StaticCapabilities,
    };
    use observability::{LogFormat, ObservabilityConfig};
    use tokio::time::{sleep, Instant};

    /// Transport whose response time depends on the beacon host
    #[derive(Default)]
    struct ScriptedTransport {
        delays: HashMap<String, u64>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn with_delay(mut self, host: &str, delay_ms: u64) -> Self {
            self.delays.insert(host.to_string(), delay_ms);
            self
        }

        fn delay_for(&self, url: &str) -> u64 {
            self.delays
                .iter()
                .find(|(host, _)| url.contains(host.as_str()))
                .map(|(_, delay)| *delay)
                .unwrap_or(0)
        }
    }

    impl BeaconTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, url: &str) -> Result<(), ContractError> {
            sleep(Duration::from_millis(self.delay_for(url))).await;
            self.sent.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    /// Records every navigation with the virtual time it happened at
    struct RecordingNavigator {
        start: Instant,
        visits: Mutex<Vec<(String, Duration)>>,
    }

    impl RecordingNavigator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                start: Instant::now(),
                visits: Mutex::new(Vec::new()),
            })
        }

        fn visits(&self) -> Vec<(String, Duration)> {
            self.visits.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, url: &str) {
            self.visits
                .lock()
                .unwrap()
                .push((url.to_string(), self.start.elapsed()));
        }
    }

    /// Every click lands on a link to the current `href`
    struct LinkResolver {
        href: Mutex<String>,
    }

    impl LinkResolver {
        fn new(href: &str) -> Arc<Self> {
            Arc::new(Self {
                href: Mutex::new(href.to_string()),
            })
        }

        fn point_to(&self, href: &str) {
            *self.href.lock().unwrap() = href.to_string();
        }
    }

    impl TargetResolver for LinkResolver {
        fn resolve_target(&self, _event: &ClickEvent) -> Option<ClickTarget> {
            Some(ClickTarget::link(self.href.lock().unwrap().clone()))
        }
    }

    fn webkit(version: &str) -> Arc<StaticCapabilities> {
        Arc::new(StaticCapabilities(HostCapabilities {
            beacons_survive_navigation: false,
            browser: Some(BrowserIdentity::new("webkit", version)),
        }))
    }

    fn assert_near(actual: Duration, expected_ms: u64) {
        let expected = Duration::from_millis(expected_ms);
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    const TWO_BACKENDS: &str = r#"
version = "v1"

[deferral]
deadline_ms = 150

[[backends]]
name = "fast"
page_view_url = "https://fast.example.com/pv"
event_urls = { click = "https://fast.example.com/click?a=1&amp;b=2" }

[[backends]]
name = "slow"
page_view_url = "https://slow.example.com/pv"
event_urls = { click = "https://slow.example.com/click" }
"#;

    /// Warnings only; a subscriber may already be installed by another test
    fn init_tracing() {
        let _ = observability::init_with_config(ObservabilityConfig::from_verbosity(
            0,
            true,
            LogFormat::Compact,
        ));
    }

    fn load(content: &str) -> TrackerConfig {
        ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap()
    }

    fn build(
        config: TrackerConfig,
        transport: ScriptedTransport,
        navigator: &Arc<RecordingNavigator>,
        resolver: &Arc<LinkResolver>,
    ) -> Dispatcher<ScriptedTransport> {
        init_tracing();
        Dispatcher::builder(config, transport)
            .navigator(Arc::clone(navigator) as Arc<dyn Navigator>)
            .target_resolver(Arc::clone(resolver) as Arc<dyn TargetResolver>)
            .capability_probe(webkit("10.0"))
            .build()
            .unwrap()
    }

    /// A slow backend cannot hold the page past the deadline
    #[tokio::test(start_paused = true)]
    async fn test_e2e_deadline_releases_navigation() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let transport = ScriptedTransport::default()
            .with_delay("fast.example.com", 40)
            .with_delay("slow.example.com", 300);
        let dispatcher = build(load(TWO_BACKENDS), transport, &navigator, &resolver);

        let mut event = ClickEvent::new(EventKind::Click);
        let outcome = dispatcher.handle_click(&mut event);
        assert!(matches!(outcome, ClickOutcome::Deferred { .. }));
        assert!(event.default_prevented());

        sleep(Duration::from_millis(500)).await;

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].0, "https://example.com/next");
        assert_near(visits[0].1, 150);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.fired, 2);
        assert_eq!(metrics.settled, 2);
        assert_eq!(metrics.deadline_navigations, 1);
    }

    /// Fast backends release navigation as soon as the last one answers
    #[tokio::test(start_paused = true)]
    async fn test_e2e_all_settled_navigates_early() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let transport = ScriptedTransport::default()
            .with_delay("fast.example.com", 20)
            .with_delay("slow.example.com", 30);
        let dispatcher = build(load(TWO_BACKENDS), transport, &navigator, &resolver);

        let mut event = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut event);
        sleep(Duration::from_millis(500)).await;

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_near(visits[0].1, 30);
        assert_eq!(dispatcher.metrics().settled_navigations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_wait_out_remainder() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let transport = ScriptedTransport::default()
            .with_delay("fast.example.com", 20)
            .with_delay("slow.example.com", 30);
        let mut config = load(TWO_BACKENDS);
        config.deferral.wait_out_remainder = true;
        let dispatcher = build(config, transport, &navigator, &resolver);

        let mut event = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut event);
        sleep(Duration::from_millis(500)).await;

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_near(visits[0].1, 150);
    }

    /// A click while the first one waits out its deadline replaces it
    #[tokio::test(start_paused = true)]
    async fn test_e2e_second_click_during_wait_out() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/first");
        let transport = ScriptedTransport::default()
            .with_delay("fast.example.com", 20)
            .with_delay("slow.example.com", 20);
        let mut config = load(TWO_BACKENDS);
        config.deferral.wait_out_remainder = true;
        let dispatcher = build(config, transport, &navigator, &resolver);

        let mut first = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut first);
        sleep(Duration::from_millis(50)).await;
        let first_batch = dispatcher.coordinator().current().unwrap();
        assert_eq!(first_batch.state(), BatchState::WaitingOut);

        resolver.point_to("https://example.com/second");
        let mut second = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut second);
        assert_eq!(first_batch.state(), BatchState::Superseded);

        sleep(Duration::from_millis(1000)).await;
        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].0, "https://example.com/second");
        assert_near(visits[0].1, 200);
    }

    /// With no backends there is nothing to wait for
    #[tokio::test(start_paused = true)]
    async fn test_e2e_no_backends_navigates_immediately() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let dispatcher = build(
            TrackerConfig::default(),
            ScriptedTransport::default(),
            &navigator,
            &resolver,
        );

        let mut event = ClickEvent::new(EventKind::Click);
        assert!(matches!(
            dispatcher.handle_click(&mut event),
            ClickOutcome::Deferred { .. }
        ));

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].1, Duration::ZERO);
    }

    /// A second click replaces the first hold; only the second target is visited
    #[tokio::test(start_paused = true)]
    async fn test_e2e_second_click_supersedes_first() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/first");
        let transport = ScriptedTransport::default()
            .with_delay("fast.example.com", 300)
            .with_delay("slow.example.com", 300);
        let dispatcher = build(load(TWO_BACKENDS), transport, &navigator, &resolver);

        let mut first = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut first);

        sleep(Duration::from_millis(50)).await;
        resolver.point_to("https://example.com/second");
        let mut second = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut second);

        sleep(Duration::from_millis(1000)).await;

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].0, "https://example.com/second");
        assert_near(visits[0].1, 200);
        assert_eq!(dispatcher.metrics().superseded, 1);
        assert_eq!(dispatcher.metrics().in_flight(), 0);
    }

    /// Modified clicks still report but never hold navigation
    #[tokio::test(start_paused = true)]
    async fn test_e2e_modified_click_passes_through() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let dispatcher = build(
            load(TWO_BACKENDS),
            ScriptedTransport::default(),
            &navigator,
            &resolver,
        );

        let mut event = ClickEvent::new(EventKind::Click).with_modifiers(contracts::Modifiers {
            ctrl: true,
            ..contracts::Modifiers::default()
        });
        assert_eq!(
            dispatcher.handle_click(&mut event),
            ClickOutcome::Ineligible(SkipReason::ModifierHeld)
        );
        assert!(!event.default_prevented());

        sleep(Duration::from_millis(500)).await;
        assert!(navigator.visits().is_empty());
        assert_eq!(dispatcher.metrics().fired, 2);
    }

    /// Beacon URLs reach the transport with `&amp;` decoded
    #[tokio::test(start_paused = true)]
    async fn test_e2e_click_urls_unescaped() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let dispatcher = build(
            load(TWO_BACKENDS),
            ScriptedTransport::default(),
            &navigator,
            &resolver,
        );

        let mut event = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut event);
        sleep(Duration::from_millis(10)).await;

        let sent = dispatcher.transport().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&"https://fast.example.com/click?a=1&b=2".to_string()));
        assert!(sent.contains(&"https://slow.example.com/click".to_string()));
    }

    /// The persisted bucket decides which backends see the client
    #[tokio::test]
    async fn test_e2e_sampling_follows_cookie() {
        let config = load(
            r#"
[[backends]]
name = "half"
sampling_rate = 50
page_view_url = "https://half.example.com/pv"

[[backends]]
name = "all"
page_view_url = "https://all.example.com/pv"
"#,
        );
        let jar = Arc::new(MemoryCookieJar::new("www.example.com").with_cookie("trk_sample", "70"));
        let dispatcher = Dispatcher::builder(config, ScriptedTransport::default())
            .cookie_jar(Arc::clone(&jar) as Arc<dyn CookieJar>)
            .build()
            .unwrap();

        let report = dispatcher.track_page_view();
        assert_eq!(report.fired, 1);
        assert_eq!(report.sampled_out, 1);

        let stored = jar.stored("trk_sample").unwrap();
        assert_eq!(stored.value, "70");
        assert_eq!(stored.domain, ".example.com");
        assert!(dispatcher.wait_settled(Duration::from_secs(1)).await);
    }

    struct BrokenBackend;

    impl TrackingBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        fn event_tracking_url(&self, _kind: EventKind) -> Result<String, ContractError> {
            panic!("backend bug")
        }

        fn page_view_tracking_url(&self) -> Result<String, ContractError> {
            Ok("javascript:alert(1)".to_string())
        }
    }

    /// A broken backend never stops the others or the navigation
    #[tokio::test(start_paused = true)]
    async fn test_e2e_broken_backend_isolated() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let transport = ScriptedTransport::default().with_delay("fast.example.com", 10);
        let dispatcher = build(load(TWO_BACKENDS), transport, &navigator, &resolver);
        dispatcher.register(Arc::new(BrokenBackend));

        let page_view = dispatcher.track_page_view();
        assert_eq!(page_view.fired, 2);
        assert_eq!(page_view.failed, 1);

        let mut event = ClickEvent::new(EventKind::Click);
        dispatcher.handle_click(&mut event);
        sleep(Duration::from_millis(500)).await;

        let visits = navigator.visits();
        assert_eq!(visits.len(), 1);
        assert_near(visits[0].1, 10);
        assert_eq!(dispatcher.metrics().failures, 2);
    }

    /// Old browsers keep their native navigation
    #[tokio::test(start_paused = true)]
    async fn test_e2e_old_browser_not_held() {
        let navigator = RecordingNavigator::new();
        let resolver = LinkResolver::new("https://example.com/next");
        let dispatcher = Dispatcher::builder(load(TWO_BACKENDS), ScriptedTransport::default())
            .navigator(Arc::clone(&navigator) as Arc<dyn Navigator>)
            .target_resolver(Arc::clone(&resolver) as Arc<dyn TargetResolver>)
            .capability_probe(webkit("3.0"))
            .build()
            .unwrap();

        let mut event = ClickEvent::new(EventKind::Click);
        assert_eq!(dispatcher.handle_click(&mut event), ClickOutcome::HoldDisabled);
        assert!(!event.default_prevented());
        sleep(Duration::from_millis(500)).await;
        assert!(navigator.visits().is_empty());
    }
}

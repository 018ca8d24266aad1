//! SamplingDecision - stable per-session inclusion bucket
//!
//! The bucket is an integer in `0..100`, computed once per page life and persisted
//! in a cookie so the same client stays in or out of percentage-based tracking
//! across sessions.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use contracts::{CookieJar, SamplingConfig};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::debug;

/// Number of sampling buckets
pub const BUCKETS: u8 = 100;

/// Lazily computed, persisted sampling bucket
pub struct SamplingDecision {
    config: SamplingConfig,
    jar: Arc<dyn CookieJar>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    bucket: OnceLock<u8>,
}

impl SamplingDecision {
    /// Create a decision backed by an OS-seeded RNG
    pub fn new(config: SamplingConfig, jar: Arc<dyn CookieJar>) -> Self {
        Self::with_rng(config, jar, StdRng::from_os_rng())
    }

    /// Create a decision with a caller-supplied RNG
    pub fn with_rng(
        config: SamplingConfig,
        jar: Arc<dyn CookieJar>,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            config,
            jar,
            rng: Mutex::new(Box::new(rng)),
            bucket: OnceLock::new(),
        }
    }

    /// The bucket for this page life
    ///
    /// Reads the persisted value first; generates a uniform one otherwise. The
    /// result is persisted (refreshing the cookie lifetime) on first computation.
    pub fn sample(&self) -> u8 {
        *self.bucket.get_or_init(|| self.compute())
    }

    /// True iff `sample() <= rate`
    pub fn is_sampled(&self, rate: u8) -> bool {
        self.sample() <= rate
    }

    /// Whether the bucket has been computed yet
    pub fn is_computed(&self) -> bool {
        self.bucket.get().is_some()
    }

    fn compute(&self) -> u8 {
        let persisted = self
            .jar
            .get(&self.config.cookie_name)
            .and_then(|raw| parse_bucket(&raw));

        let bucket = match persisted {
            Some(bucket) => bucket,
            None => self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(0..BUCKETS),
        };

        let domain = registrable_domain(&self.jar.page_host());
        self.jar.set(
            &self.config.cookie_name,
            &bucket.to_string(),
            self.config.lifetime(),
            &domain,
        );

        debug!(
            bucket,
            persisted = persisted.is_some(),
            domain = %domain,
            "Sampling bucket computed"
        );
        bucket
    }
}

/// Parse a persisted bucket, reducing out-of-range values modulo 100
fn parse_bucket(raw: &str) -> Option<u8> {
    let value: i64 = raw.trim().parse().ok()?;
    u8::try_from(value.rem_euclid(i64::from(BUCKETS))).ok()
}

/// Cookie domain covering the page's registrable domain
///
/// `www.shop.example.com` -> `.example.com`. IP literals, `localhost` and other
/// single-label hosts are returned unchanged (host-only cookie).
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim().trim_end_matches('.');
    if host.parse::<IpAddr>().is_ok() || host.starts_with('[') {
        return host.to_string();
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.as_slice() {
        [.., second, top] => format!(".{second}.{top}"),
        _ => host.to_string(),
    }
}

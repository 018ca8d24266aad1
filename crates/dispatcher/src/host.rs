//! Built-in host collaborators
//!
//! Used when the embedding host does not supply its own, and by tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    CapabilityProbe, ClickEvent, ClickTarget, ContractError, CookieJar, HostCapabilities,
    Navigator, TargetResolver,
};
use tracing::info;

/// A cookie as written by [`MemoryCookieJar`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    pub max_age: Duration,
    pub domain: String,
}

/// Process-local cookie storage
#[derive(Debug)]
pub struct MemoryCookieJar {
    host: String,
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl MemoryCookieJar {
    /// Empty jar for a page served from `host`
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            cookies: Mutex::new(HashMap::new()),
        }
    }

    /// Pre-populate a cookie (e.g. one persisted by an earlier session)
    pub fn with_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let cookie = StoredCookie {
            value: value.into(),
            max_age: Duration::ZERO,
            domain: self.host.clone(),
        };
        self.lock().insert(name.into(), cookie);
        self
    }

    /// Full record of a stored cookie
    pub fn stored(&self, name: &str) -> Option<StoredCookie> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredCookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCookieJar {
    fn default() -> Self {
        Self::new("localhost")
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).map(|c| c.value.clone())
    }

    fn set(&self, name: &str, value: &str, max_age: Duration, domain: &str) {
        let cookie = StoredCookie {
            value: value.to_string(),
            max_age,
            domain: domain.to_string(),
        };
        self.lock().insert(name.to_string(), cookie);
    }

    fn page_host(&self) -> String {
        self.host.clone()
    }
}

/// Capability probe returning a fixed descriptor
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities(pub HostCapabilities);

impl CapabilityProbe for StaticCapabilities {
    fn detect(&self) -> Result<HostCapabilities, ContractError> {
        Ok(self.0.clone())
    }
}

/// Resolver for hosts without a document: no click has a target
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTargets;

impl TargetResolver for NoTargets {
    fn resolve_target(&self, _event: &ClickEvent) -> Option<ClickTarget> {
        None
    }
}

/// Navigator that only logs the navigation
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        info!(url = %url, "Navigate");
    }
}

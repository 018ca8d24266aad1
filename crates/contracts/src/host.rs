//! Host collaborator contracts
//!
//! Everything the tracker needs from the page runtime: navigation, cookie storage,
//! capability detection and click target resolution.

use std::time::Duration;

use crate::{ClickEvent, ClickTarget, ContractError};

/// Performs the programmatic navigation after a deferred click
pub trait Navigator: Send + Sync {
    /// Assign the page location
    fn navigate(&self, url: &str);
}

/// Persistent cookie storage
pub trait CookieJar: Send + Sync {
    /// Read a cookie value
    fn get(&self, name: &str) -> Option<String>;

    /// Write a cookie scoped to `domain` that expires after `max_age`
    fn set(&self, name: &str, value: &str, max_age: Duration, domain: &str);

    /// Host name of the current page
    fn page_host(&self) -> String;
}

/// Detected browser family and version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserIdentity {
    /// Family name (e.g. "webkit")
    pub family: String,
    /// Dotted version string (e.g. "10.0")
    pub version: String,
}

impl BrowserIdentity {
    pub fn new(family: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            version: version.into(),
        }
    }
}

/// Capability descriptor supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCapabilities {
    /// In-flight beacons are not cancelled when the page unloads
    pub beacons_survive_navigation: bool,
    /// Browser identity, when known
    pub browser: Option<BrowserIdentity>,
}

/// Detects host capabilities once per page life
pub trait CapabilityProbe: Send + Sync {
    /// # Errors
    /// Returns a detection error; callers fail open.
    fn detect(&self) -> Result<HostCapabilities, ContractError>;
}

/// Resolves the element a click is attributed to (DOM walk)
pub trait TargetResolver: Send + Sync {
    fn resolve_target(&self, event: &ClickEvent) -> Option<ClickTarget>;
}

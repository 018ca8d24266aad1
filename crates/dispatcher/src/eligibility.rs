//! EligibilityPolicy - whether navigation deferral applies on this page at all
//!
//! Decided once per page life: browser identity cannot change mid-session.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use contracts::{CapabilityProbe, DeferralConfig, DottedVersion, HostCapabilities};
use tracing::{debug, info, warn};

/// Cached hold decision
pub struct EligibilityPolicy {
    enabled: bool,
    min_versions: BTreeMap<String, String>,
    probe: Arc<dyn CapabilityProbe>,
    hold_enabled: OnceLock<bool>,
}

impl EligibilityPolicy {
    pub fn new(config: &DeferralConfig, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            enabled: config.enabled,
            min_versions: config
                .min_versions
                .iter()
                .map(|(family, floor)| (family.to_ascii_lowercase(), floor.clone()))
                .collect(),
            probe,
            hold_enabled: OnceLock::new(),
        }
    }

    /// Whether clicks on this page may be held; computed on first call
    pub fn hold_enabled(&self) -> bool {
        *self.hold_enabled.get_or_init(|| self.evaluate())
    }

    /// Whether the decision has been made yet
    pub fn is_computed(&self) -> bool {
        self.hold_enabled.get().is_some()
    }

    fn evaluate(&self) -> bool {
        if !self.enabled {
            info!("Navigation deferral disabled by configuration");
            return false;
        }

        let hold = match self.probe.detect() {
            Ok(capabilities) => decide(&capabilities, &self.min_versions),
            Err(e) => {
                warn!(error = %e, "Capability detection failed, not holding navigation");
                false
            }
        };
        info!(hold_enabled = hold, "Navigation deferral decided");
        hold
    }
}

/// Pure decision from detected capabilities and the per-family version floors
///
/// Families in `min_versions` must already be lowercase.
pub fn decide(capabilities: &HostCapabilities, min_versions: &BTreeMap<String, String>) -> bool {
    if capabilities.beacons_survive_navigation {
        debug!("Beacons survive navigation, deferral unnecessary");
        return false;
    }

    let Some(browser) = &capabilities.browser else {
        debug!("Unknown browser, not holding");
        return false;
    };

    let Some(floor) = min_versions.get(&browser.family.to_ascii_lowercase()) else {
        debug!(family = %browser.family, "Unrecognized browser family, not holding");
        return false;
    };

    match (
        browser.version.parse::<DottedVersion>(),
        floor.parse::<DottedVersion>(),
    ) {
        (Ok(version), Ok(floor)) => version >= floor,
        (version, floor) => {
            warn!(
                family = %browser.family,
                version = %browser.version,
                version_error = ?version.err(),
                floor_error = ?floor.err(),
                "Unparsable browser version, not holding"
            );
            false
        }
    }
}

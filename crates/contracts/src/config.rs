//! TrackerConfig - Config Loader output
//!
//! Describes navigation deferral, sampling and the statically configured backends.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Navigation deferral settings
    #[serde(default)]
    pub deferral: DeferralConfig,

    /// Sampling bucket settings
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Backends registered at startup
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Navigation deferral settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferralConfig {
    /// Feature flag; `false` disables deferral for the page's life
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum time a click's navigation is held
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// When all beacons settle early, still navigate at the deadline
    #[serde(default)]
    pub wait_out_remainder: bool,

    /// Browser family -> minimum version that gets deferral
    #[serde(default = "default_min_versions")]
    pub min_versions: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

fn default_deadline_ms() -> u64 {
    150
}

fn default_min_versions() -> BTreeMap<String, String> {
    BTreeMap::from([("webkit".to_string(), "5.0".to_string())])
}

impl Default for DeferralConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            deadline_ms: default_deadline_ms(),
            wait_out_remainder: false,
            min_versions: default_min_versions(),
        }
    }
}

impl DeferralConfig {
    /// Deadline as a duration
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Sampling bucket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Name of the cookie holding the bucket
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie lifetime in days
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: u32,

    /// Rate applied to backends that declare none (or an invalid one)
    #[serde(default = "default_rate")]
    pub default_rate: u8,
}

fn default_cookie_name() -> String {
    "trk_sample".to_string()
}

fn default_lifetime_days() -> u32 {
    182
}

fn default_rate() -> u8 {
    99
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime_days: default_lifetime_days(),
            default_rate: default_rate(),
        }
    }
}

impl SamplingConfig {
    /// Cookie lifetime as a duration
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(u64::from(self.lifetime_days) * 24 * 60 * 60)
    }
}

/// Statically configured backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend name
    pub name: String,

    /// Sampling rate 0..=100 (default rate when absent)
    #[serde(default)]
    pub sampling_rate: Option<i64>,

    /// Page view beacon URL (no beacon when absent)
    #[serde(default)]
    pub page_view_url: Option<String>,

    /// Event wire name -> beacon URL
    #[serde(default)]
    pub event_urls: BTreeMap<String, String>,
}

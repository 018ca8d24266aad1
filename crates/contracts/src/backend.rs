//! TrackingBackend trait - one independently configured analytics destination
//!
//! A backend only turns page/event metadata into a beacon URL. It never does I/O.

use crate::{ContractError, EventKind};

/// Beacon URL producer
///
/// An empty string from either URL method means "do not fire".
pub trait TrackingBackend: Send + Sync {
    /// Backend name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Declared sampling rate, 0..=100
    ///
    /// `None` or an out-of-range value is replaced by the configured default.
    fn sampling_rate(&self) -> Option<i64> {
        None
    }

    /// URL for an interaction event
    ///
    /// # Errors
    /// Returns an error when the backend cannot compute a URL; the error is isolated
    /// to this backend.
    fn event_tracking_url(&self, event: EventKind) -> Result<String, ContractError>;

    /// URL for a page view
    ///
    /// # Errors
    /// Same isolation rules as [`TrackingBackend::event_tracking_url`].
    fn page_view_tracking_url(&self) -> Result<String, ContractError>;
}

/// Whether `url` is usable as a beacon destination
///
/// Accepts `http://`, `https://` and protocol-relative `//` URLs with no whitespace
/// or control characters.
pub fn is_beacon_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let has_scheme = ["http://", "https://", "//"]
        .iter()
        .any(|prefix| lower.len() > prefix.len() && lower.starts_with(prefix));
    has_scheme && !url.chars().any(|c| c.is_whitespace() || c.is_control())
}

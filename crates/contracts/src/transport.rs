//! BeaconTransport trait - issues a single beacon request
//!
//! Beacons are best-effort. An `Err` is reported for logging only; callers treat
//! success, failure and cancellation alike as "settled".

use crate::ContractError;

/// Beacon request transport
#[trait_variant::make(BeaconTransport: Send)]
pub trait LocalBeaconTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Issue a GET for `url` and wait until the request is done with
    ///
    /// # Errors
    /// Returns a transport error when the request could not complete normally.
    async fn send(&self, url: &str) -> Result<(), ContractError>;
}

//! LogTransport - logs beacons via tracing instead of sending them

use contracts::{BeaconTransport, ContractError};
use tracing::{info, instrument};

/// Transport that logs beacon URLs (dry runs, debugging)
pub struct LogTransport {
    name: String,
}

impl LogTransport {
    /// Create a new LogTransport with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BeaconTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_transport_send", skip(self), fields(transport = %self.name))]
    async fn send(&self, url: &str) -> Result<(), ContractError> {
        info!(transport = %self.name, url = %url, "Beacon");
        Ok(())
    }
}

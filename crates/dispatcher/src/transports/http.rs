//! HttpBeaconTransport - image-style GET beacons over HTTP

use std::time::Duration;

use contracts::{BeaconTransport, ContractError};
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// Default request timeout; beacons are abandoned, never retried
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport issuing a GET per beacon and discarding the response body
pub struct HttpBeaconTransport {
    name: String,
    client: Client,
}

impl HttpBeaconTransport {
    /// Create a transport with the given request timeout
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(name: impl Into<String>, timeout: Duration) -> Result<Self, DispatcherError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatcherError::transport_creation(&name, e.to_string()))?;

        Ok(Self { name, client })
    }

    /// Protocol-relative beacon URLs are issued over https
    fn absolute_url(url: &str) -> String {
        match url.strip_prefix("//") {
            Some(rest) => format!("https://{rest}"),
            None => url.to_string(),
        }
    }
}

impl BeaconTransport for HttpBeaconTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "http_transport_send", skip(self), fields(transport = %self.name))]
    async fn send(&self, url: &str) -> Result<(), ContractError> {
        let response = self
            .client
            .get(Self::absolute_url(url))
            .send()
            .await
            .map_err(|e| ContractError::transport(&self.name, e.to_string()))?;

        debug!(
            transport = %self.name,
            status = %response.status(),
            "Beacon response"
        );
        Ok(())
    }
}

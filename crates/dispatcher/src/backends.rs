//! StaticBackend - backend whose URLs come straight from configuration

use std::collections::HashMap;

use contracts::{BackendConfig, ContractError, EventKind, TrackingBackend};

/// Backend with fixed page view and per-event URLs
#[derive(Debug, Clone)]
pub struct StaticBackend {
    name: String,
    sampling_rate: Option<i64>,
    page_view_url: Option<String>,
    event_urls: HashMap<EventKind, String>,
}

impl StaticBackend {
    /// Build from a validated config entry
    ///
    /// # Errors
    /// Returns a validation error for unknown event names.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ContractError> {
        let event_urls = config
            .event_urls
            .iter()
            .map(|(event, url)| {
                event
                    .parse::<EventKind>()
                    .map(|kind| (kind, url.clone()))
                    .map_err(|e| {
                        ContractError::config_validation(
                            format!("backends[{}].event_urls.{event}", config.name),
                            e,
                        )
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            sampling_rate: config.sampling_rate,
            page_view_url: config.page_view_url.clone(),
            event_urls,
        })
    }
}

impl TrackingBackend for StaticBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn sampling_rate(&self) -> Option<i64> {
        self.sampling_rate
    }

    fn event_tracking_url(&self, event: EventKind) -> Result<String, ContractError> {
        Ok(self.event_urls.get(&event).cloned().unwrap_or_default())
    }

    fn page_view_tracking_url(&self) -> Result<String, ContractError> {
        Ok(self.page_view_url.clone().unwrap_or_default())
    }
}

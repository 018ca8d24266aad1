//! Configuration validation
//!
//! Rules:
//! - deadline_ms in 1..=10000
//! - version floors parse as dotted numbers
//! - cookie name non-empty, lifetime >= 1 day, default rate <= 100
//! - backend names non-empty and unique
//! - backend sampling_rate in 0..=100 when present
//! - backend URLs are well-formed beacon URLs
//! - event_urls keys are known event names

use std::collections::HashSet;

use contracts::{
    is_beacon_url, BackendConfig, ContractError, DottedVersion, EventKind, TrackerConfig,
};

const MAX_DEADLINE_MS: u64 = 10_000;

/// Validate a TrackerConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &TrackerConfig) -> Result<(), ContractError> {
    validate_deferral(config)?;
    validate_sampling(config)?;
    validate_backend_names(config)?;
    for backend in &config.backends {
        validate_backend(backend)?;
    }
    Ok(())
}

fn validate_deferral(config: &TrackerConfig) -> Result<(), ContractError> {
    let deferral = &config.deferral;
    if deferral.deadline_ms == 0 || deferral.deadline_ms > MAX_DEADLINE_MS {
        return Err(ContractError::config_validation(
            "deferral.deadline_ms",
            format!(
                "deadline_ms must be in 1..={MAX_DEADLINE_MS}, got {}",
                deferral.deadline_ms
            ),
        ));
    }

    for (family, floor) in &deferral.min_versions {
        if let Err(e) = floor.parse::<DottedVersion>() {
            return Err(ContractError::config_validation(
                format!("deferral.min_versions.{family}"),
                e,
            ));
        }
    }
    Ok(())
}

fn validate_sampling(config: &TrackerConfig) -> Result<(), ContractError> {
    let sampling = &config.sampling;
    if sampling.cookie_name.trim().is_empty() {
        return Err(ContractError::config_validation(
            "sampling.cookie_name",
            "cookie_name must not be empty",
        ));
    }
    if sampling.lifetime_days == 0 {
        return Err(ContractError::config_validation(
            "sampling.lifetime_days",
            "lifetime_days must be >= 1",
        ));
    }
    if sampling.default_rate > 100 {
        return Err(ContractError::config_validation(
            "sampling.default_rate",
            format!("default_rate must be <= 100, got {}", sampling.default_rate),
        ));
    }
    Ok(())
}

/// Backend names must be unique
fn validate_backend_names(config: &TrackerConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for backend in &config.backends {
        if backend.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "backends[].name",
                "backend name must not be empty",
            ));
        }
        if !seen.insert(&backend.name) {
            return Err(ContractError::config_validation(
                format!("backends[name={}]", backend.name),
                "duplicate backend name",
            ));
        }
    }
    Ok(())
}

fn validate_backend(backend: &BackendConfig) -> Result<(), ContractError> {
    if let Some(rate) = backend.sampling_rate {
        if !(0..=100).contains(&rate) {
            return Err(ContractError::config_validation(
                format!("backends[{}].sampling_rate", backend.name),
                format!("sampling_rate must be in 0..=100, got {rate}"),
            ));
        }
    }

    if let Some(url) = &backend.page_view_url {
        if !is_beacon_url(url) {
            return Err(ContractError::config_validation(
                format!("backends[{}].page_view_url", backend.name),
                format!("not a beacon url: '{url}'"),
            ));
        }
    }

    for (event, url) in &backend.event_urls {
        if event.parse::<EventKind>().is_err() {
            return Err(ContractError::config_validation(
                format!("backends[{}].event_urls.{event}", backend.name),
                format!("unknown event '{event}'"),
            ));
        }
        if !is_beacon_url(url) {
            return Err(ContractError::config_validation(
                format!("backends[{}].event_urls.{event}", backend.name),
                format!("not a beacon url: '{url}'"),
            ));
        }
    }
    Ok(())
}

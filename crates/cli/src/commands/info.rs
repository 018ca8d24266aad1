//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use contracts::TrackerConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    deferral: DeferralInfo,
    sampling: SamplingInfo,
    backends: Vec<BackendInfo>,
}

#[derive(Serialize)]
struct DeferralInfo {
    enabled: bool,
    deadline_ms: u64,
    wait_out_remainder: bool,
    min_versions: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SamplingInfo {
    cookie_name: String,
    lifetime_days: u32,
    default_rate: u8,
}

#[derive(Serialize)]
struct BackendInfo {
    name: String,
    sampling_rate: u8,
    page_view: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    events: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &TrackerConfig) -> ConfigInfo {
    let default_rate = config.sampling.default_rate;
    let backends = config
        .backends
        .iter()
        .map(|b| BackendInfo {
            name: b.name.clone(),
            // Validated config: explicit rates are within 0..=100
            sampling_rate: b
                .sampling_rate
                .and_then(|rate| u8::try_from(rate).ok())
                .unwrap_or(default_rate),
            page_view: b.page_view_url.is_some(),
            events: b.event_urls.keys().cloned().collect(),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", config.version),
        deferral: DeferralInfo {
            enabled: config.deferral.enabled,
            deadline_ms: config.deferral.deadline_ms,
            wait_out_remainder: config.deferral.wait_out_remainder,
            min_versions: config.deferral.min_versions.clone(),
        },
        sampling: SamplingInfo {
            cookie_name: config.sampling.cookie_name.clone(),
            lifetime_days: config.sampling.lifetime_days,
            default_rate,
        },
        backends,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("Configuration version: {}", info.version);

    println!("\nDeferral:");
    println!("  Enabled: {}", info.deferral.enabled);
    println!("  Deadline: {}ms", info.deferral.deadline_ms);
    println!("  Wait out remainder: {}", info.deferral.wait_out_remainder);
    for (family, version) in &info.deferral.min_versions {
        println!("  Minimum {}: {}", family, version);
    }

    println!("\nSampling:");
    println!("  Cookie: {}", info.sampling.cookie_name);
    println!("  Lifetime: {} days", info.sampling.lifetime_days);
    println!("  Default rate: {}", info.sampling.default_rate);

    println!("\nBackends ({}):", info.backends.len());
    for backend in &info.backends {
        println!(
            "  - {} (rate {}, page view: {})",
            backend.name, backend.sampling_rate, backend.page_view
        );
        if !backend.events.is_empty() {
            println!("      events: {}", backend.events.join(", "));
        }
    }
}

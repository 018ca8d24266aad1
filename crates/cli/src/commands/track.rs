//! `track` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use contracts::{BeaconTransport, CookieJar, TrackerConfig};
use dispatcher::{Dispatcher, DispatchReport, HttpBeaconTransport, LogTransport, MemoryCookieJar};
use tracing::{info, warn};

use crate::cli::TrackArgs;
use crate::error::CliError;

/// Extra time allowed past the HTTP timeout before giving up on settlement
const SETTLE_GRACE: Duration = Duration::from_millis(500);

/// Execute the `track` command
pub async fn run_track(args: &TrackArgs) -> Result<()> {
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }
    let config =
        config_loader::ConfigLoader::load_from_path(&args.config).map_err(CliError::from)?;

    let timeout = Duration::from_millis(args.timeout_ms);
    let report = if args.dry_run {
        fire(config, LogTransport::new("dry-run"), args, timeout).await?
    } else {
        let transport =
            HttpBeaconTransport::new("http", timeout).map_err(CliError::from)?;
        fire(config, transport, args, timeout).await?
    };

    println!(
        "fired {} beacon(s), {} sampled out, {} empty, {} failed",
        report.fired, report.sampled_out, report.empty, report.failed
    );
    Ok(())
}

async fn fire<T>(
    config: TrackerConfig,
    transport: T,
    args: &TrackArgs,
    timeout: Duration,
) -> Result<DispatchReport, CliError>
where
    T: BeaconTransport + Sync + 'static,
{
    let mut jar = MemoryCookieJar::new(args.page_host.clone());
    if let Some(bucket) = args.bucket {
        jar = jar.with_cookie(config.sampling.cookie_name.clone(), bucket.to_string());
    }

    let dispatcher = Dispatcher::builder(config, transport)
        .cookie_jar(Arc::new(jar) as Arc<dyn CookieJar>)
        .build()?;

    let report = match args.event {
        Some(kind) => dispatcher.track_event(kind),
        None => dispatcher.track_page_view(),
    };
    info!(
        bucket = dispatcher.sampling().sample(),
        fired = report.fired,
        "Tracking request dispatched"
    );

    let waited = timeout + SETTLE_GRACE;
    if !dispatcher.wait_settled(waited).await {
        let pending = dispatcher.metrics().in_flight();
        warn!(pending, "Beacons still in flight");
        return Err(CliError::unsettled(pending, waited.as_millis() as u64));
    }

    Ok(report)
}

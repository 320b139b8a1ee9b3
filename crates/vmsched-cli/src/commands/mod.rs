//! CLI commands implementation

mod dry_run;

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use vmsched_core::{HostState, RequestContext, RequestDescriptor, VmschedConfig};
use vmsched_scheduler::{
    FilterHandler, FilterScheduler, StaticHostStateProvider, TracingNotifier, WeightHandler,
};

pub use dry_run::{FreeRamWeigher, ResourceFitFilter};

/// Load a fleet snapshot. Hosts without a refresh time are treated as
/// refreshed now.
pub fn load_fleet(path: &Path) -> Result<Vec<HostState>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fleet file {}", path.display()))?;
    let mut hosts: Vec<HostState> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse fleet file {}", path.display()))?;

    let now = Utc::now();
    for host in &mut hosts {
        host.updated.get_or_insert(now);
    }
    Ok(hosts)
}

pub fn load_request(path: &Path) -> Result<RequestDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse request file {}", path.display()))
}

/// Build a scheduler over a fixed fleet with the dry-run filters and weighers
pub fn build_scheduler(
    config: &VmschedConfig,
    hosts: Vec<HostState>,
    seed: Option<u64>,
) -> FilterScheduler {
    let scheduler = FilterScheduler::new(
        config.scheduler.clone(),
        Arc::new(StaticHostStateProvider::new(hosts)),
        Arc::new(FilterHandler::default().with_filter(ResourceFitFilter)),
        Arc::new(WeightHandler::default().with_weigher(FreeRamWeigher::default())),
        Arc::new(TracingNotifier),
    );
    match seed {
        Some(seed) => scheduler.with_rng_seed(seed),
        None => scheduler,
    }
}

/// Place a batch and print the destinations
pub async fn select(
    config: &VmschedConfig,
    fleet: &Path,
    request: &Path,
    seed: Option<u64>,
) -> Result<()> {
    let hosts = load_fleet(fleet)?;
    let request = load_request(request)?;
    debug!(hosts = hosts.len(), "Loaded fleet");

    let ctx = RequestContext::new(request.user_id.clone(), request.project_id.clone());
    let scheduler = build_scheduler(config, hosts, seed);

    let destinations = scheduler.select_destinations(&ctx, request).await?;
    info!(count = destinations.len(), "Placement complete");

    println!("{}", serde_json::to_string_pretty(&destinations)?);
    Ok(())
}

/// Parse a configuration file and print it back
pub fn check_config(path: &Path) -> Result<()> {
    let config = VmschedConfig::from_file(path)?;
    println!("Configuration OK: {}", path.display());
    println!(
        "  host_subset_size: {} (effective minimum 1)",
        config.scheduler.host_subset_size
    );
    if let Some(options) = &config.scheduler.json_config_location {
        println!("  options file:     {}", options.display());
    }
    println!("  log level:        {}", config.logging.level);
    println!("  log format:       {:?}", config.logging.format);
    Ok(())
}

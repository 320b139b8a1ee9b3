//! Batch orchestrator: all-or-nothing placement of a request

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use vmsched_core::{
    Destination, RequestContext, RequestDescriptor, RequestSpec, SchedError, SchedResult,
    SchedulerConfig,
};

use crate::filter_context::FilterContext;
use crate::notifier::{SELECT_DESTINATIONS_END, SELECT_DESTINATIONS_START};
use crate::options::SchedulerOptions;
use crate::placement::{place_batch, Placement, PlacementOutcome};
use crate::traits::{FilterChain, HostStateProvider, Notifier, WeigherChain};

/// Reason given to callers when a batch cannot be placed. Deliberately
/// says nothing about how many hosts were found.
const NOT_ENOUGH_HOSTS: &str = "There are not enough hosts available.";

/// Scheduler that filters and weighs hosts to place a batch of instances.
///
/// Holds no per-call state and can be shared across concurrent calls; each
/// call works on its own request spec and host snapshot.
pub struct FilterScheduler {
    /// Configuration, fixed at construction
    config: SchedulerConfig,
    /// Source of host snapshots
    host_states: Arc<dyn HostStateProvider>,
    /// Eligibility predicates
    filters: Arc<dyn FilterChain>,
    /// Host scoring
    weighers: Arc<dyn WeigherChain>,
    /// Lifecycle event sink
    notifier: Arc<dyn Notifier>,
    /// Free-form options handed to filters
    options: SchedulerOptions,
    /// Seeds one random source per call
    rng: Mutex<StdRng>,
}

impl FilterScheduler {
    /// Create a new scheduler with an OS-seeded random source
    pub fn new(
        config: SchedulerConfig,
        host_states: Arc<dyn HostStateProvider>,
        filters: Arc<dyn FilterChain>,
        weighers: Arc<dyn WeigherChain>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        info!(
            host_subset_size = config.host_subset_size,
            json_config_location = ?config.json_config_location,
            "Scheduler initialized"
        );

        let options = SchedulerOptions::new(config.json_config_location.clone());

        Self {
            options,
            config,
            host_states,
            filters,
            weighers,
            notifier,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Use a fixed seed, making host picks reproducible for a given
    /// sequence of calls
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Select one destination per requested instance.
    ///
    /// Returns exactly `num_instances` destinations in assignment order, or
    /// fails the whole batch with `NoValidHost`.
    pub async fn select_destinations(
        &self,
        ctx: &RequestContext,
        request: RequestDescriptor,
    ) -> SchedResult<Vec<Destination>> {
        let spec = RequestSpec::from_descriptor(request)?;

        info!(
            request_id = %ctx.request_id,
            num_instances = spec.num_instances,
            flavor = %spec.flavor.name,
            "Selecting destinations"
        );

        self.notify(ctx, SELECT_DESTINATIONS_START, &spec).await;

        let mut placement = self.schedule(ctx, &spec).await?;

        if !placement.is_complete() {
            return Err(self.fail_batch(ctx, &mut placement).await);
        }

        let destinations = placement.destinations();

        self.notify(ctx, SELECT_DESTINATIONS_END, &spec).await;

        info!(
            request_id = %ctx.request_id,
            destinations = destinations.len(),
            "Destinations selected"
        );

        Ok(destinations)
    }

    /// Run the placement loop against a fresh snapshot.
    ///
    /// The snapshot is fetched once, with elevated rights, before the first
    /// round. The returned placement may be short.
    pub async fn schedule(&self, ctx: &RequestContext, spec: &RequestSpec) -> SchedResult<Placement> {
        let elevated = ctx.elevated();
        let config_options = self.options.get_configuration();
        let hosts = self.host_states.get_all_host_states(&elevated).await?;

        debug!(
            request_id = %ctx.request_id,
            hosts = hosts.len(),
            "Fetched host states"
        );

        let mut rng = self.call_rng();
        place_batch(
            FilterContext::new(ctx, spec, &self.config).with_config_options(config_options),
            self.filters.as_ref(),
            self.weighers.as_ref(),
            hosts,
            &mut rng,
        )
    }

    /// Invalidate everything a short placement consumed from and build the
    /// error returned to the caller. A failing provider hook is logged and
    /// does not replace the batch error.
    async fn fail_batch(&self, ctx: &RequestContext, placement: &mut Placement) -> SchedError {
        let keys = placement.invalidate_selected();
        if let Err(e) = self.host_states.invalidate(ctx, &keys).await {
            warn!(
                request_id = %ctx.request_id,
                hosts = keys.len(),
                error = %e,
                "Failed to invalidate host states"
            );
        }

        // Details stay in the operator log, not in the returned reason.
        debug!(
            request_id = %ctx.request_id,
            hosts = placement.selected().len(),
            num_instances = placement.requested(),
            "There are {} hosts available but {} instances requested to build",
            placement.selected().len(),
            placement.requested()
        );

        match placement.outcome() {
            PlacementOutcome::Cancelled => SchedError::Cancelled,
            _ => SchedError::no_valid_host(NOT_ENOUGH_HOSTS),
        }
    }

    fn call_rng(&self) -> StdRng {
        let mut master = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::seed_from_u64(master.random::<u64>())
    }

    /// Emit a lifecycle event. Sink failures are logged, never fatal.
    async fn notify(&self, ctx: &RequestContext, event_type: &str, spec: &RequestSpec) {
        let payload = json!({ "request_spec": spec.to_legacy_request_spec() });
        if let Err(e) = self.notifier.info(ctx, event_type, payload).await {
            warn!(
                request_id = %ctx.request_id,
                event_type,
                error = %e,
                "Failed to emit notification"
            );
        }
    }
}

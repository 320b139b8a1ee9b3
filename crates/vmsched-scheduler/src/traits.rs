//! Contracts for the collaborators the scheduler drives

use async_trait::async_trait;
use serde_json::Value;
use vmsched_core::{HostKey, HostState, RequestContext, SchedResult};

use crate::filter_context::FilterContext;

/// Source of host state snapshots
#[async_trait]
pub trait HostStateProvider: Send + Sync {
    /// Fetch a materialized snapshot of every candidate host.
    ///
    /// Called once per scheduling call. The returned states are owned by that
    /// call alone and are never re-fetched while it runs.
    async fn get_all_host_states(&self, ctx: &RequestContext) -> SchedResult<Vec<HostState>>;

    /// Told which hosts a failed batch consumed from, so cached copies of
    /// them can be dropped and reloaded from the authoritative store.
    async fn invalidate(&self, _ctx: &RequestContext, _hosts: &[HostKey]) -> SchedResult<()> {
        Ok(())
    }
}

/// Ordered eligibility predicates narrowing the host list for one round
pub trait FilterChain: Send + Sync {
    fn get_filtered_hosts<'a>(
        &self,
        hosts: Vec<&'a HostState>,
        ctx: &FilterContext<'_>,
        index: u32,
    ) -> SchedResult<Vec<&'a HostState>>;
}

/// A host with its combined weight for the current round
#[derive(Debug, Clone, Copy)]
pub struct WeighedHost<'a> {
    pub host: &'a HostState,
    pub weight: f64,
}

/// Scoring of filtered hosts, best first
pub trait WeigherChain: Send + Sync {
    fn get_weighed_hosts<'a>(
        &self,
        hosts: Vec<&'a HostState>,
        ctx: &FilterContext<'_>,
    ) -> SchedResult<Vec<WeighedHost<'a>>>;
}

/// Sink for scheduler lifecycle events
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn info(&self, ctx: &RequestContext, event_type: &str, payload: Value) -> SchedResult<()>;
}

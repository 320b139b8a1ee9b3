//! Generic filter chain running an ordered list of host predicates

use tracing::{debug, info};
use vmsched_core::{HostState, SchedResult};

use crate::filter_context::FilterContext;
use crate::traits::FilterChain;

/// A single eligibility predicate
pub trait HostFilter: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Filters whose result cannot change within a batch only need to run
    /// for the first instance.
    fn run_once_per_request(&self) -> bool {
        false
    }

    fn run_filter_for_index(&self, index: u32) -> bool {
        !self.run_once_per_request() || index == 0
    }

    fn host_passes(&self, host: &HostState, ctx: &FilterContext<'_>) -> bool;
}

/// Filter chain applying request-level host overrides, then each filter in order
#[derive(Default)]
pub struct FilterHandler {
    filters: Vec<Box<dyn HostFilter>>,
}

impl FilterHandler {
    pub fn new(filters: Vec<Box<dyn HostFilter>>) -> Self {
        Self { filters }
    }

    pub fn with_filter(mut self, filter: impl HostFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

fn matches_any(name: &str, wanted: &[String]) -> bool {
    wanted.iter().any(|w| w.eq_ignore_ascii_case(name))
}

impl FilterChain for FilterHandler {
    fn get_filtered_hosts<'a>(
        &self,
        mut hosts: Vec<&'a HostState>,
        ctx: &FilterContext<'_>,
        index: u32,
    ) -> SchedResult<Vec<&'a HostState>> {
        let spec = ctx.spec;

        if !spec.ignore_hosts.is_empty() {
            hosts.retain(|h| !matches_any(&h.host, &spec.ignore_hosts));
            debug!(ignored = ?spec.ignore_hosts, remaining = hosts.len(), "Stripped ignored hosts");
        }

        if !spec.force_hosts.is_empty() || !spec.force_nodes.is_empty() {
            if !spec.force_hosts.is_empty() {
                hosts.retain(|h| matches_any(&h.host, &spec.force_hosts));
            }
            if !spec.force_nodes.is_empty() {
                hosts.retain(|h| matches_any(&h.nodename, &spec.force_nodes));
            }
            if hosts.is_empty() {
                info!(
                    force_hosts = ?spec.force_hosts,
                    force_nodes = ?spec.force_nodes,
                    "No hosts matched forced hosts/nodes"
                );
            }
            // Forced placement skips the filters.
            return Ok(hosts);
        }

        for filter in &self.filters {
            if !filter.run_filter_for_index(index) {
                continue;
            }
            hosts.retain(|h| filter.host_passes(h, ctx));
            if hosts.is_empty() {
                info!(filter = filter.name(), index, "Filter returned 0 hosts");
                break;
            }
            debug!(filter = filter.name(), index, remaining = hosts.len(), "Filter applied");
        }

        Ok(hosts)
    }
}

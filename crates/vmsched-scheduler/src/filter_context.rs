//! Per-call state threaded through filter and weigher invocations

use serde_json::{Map, Value};
use std::collections::HashSet;
use vmsched_core::{GroupPolicy, RequestContext, RequestSpec, SchedulerConfig};

/// Typed view of the request and the state accumulated across rounds
#[derive(Debug, Clone)]
pub struct FilterContext<'a> {
    pub request_context: &'a RequestContext,
    pub spec: &'a RequestSpec,
    pub config: &'a SchedulerConfig,
    /// Index of the instance being placed in the current round
    pub index: u32,
    /// Whether this batch belongs to a server group whose host set is
    /// maintained across rounds
    pub group_updated: bool,
    /// Hosts already used by the server group, including earlier rounds
    pub group_hosts: HashSet<String>,
    pub group_policies: Vec<GroupPolicy>,
    /// Flat request description for filters written against the legacy shape
    pub request_spec: Value,
    /// Legacy filter properties, kept in step with `group_hosts` and
    /// carrying the scheduler options under `config_options`
    pub filter_properties: Value,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        request_context: &'a RequestContext,
        spec: &'a RequestSpec,
        config: &'a SchedulerConfig,
    ) -> Self {
        let (group_updated, group_hosts, group_policies) = match &spec.instance_group {
            Some(group) => (
                true,
                group.hosts.iter().cloned().collect(),
                group.policies.clone(),
            ),
            None => (false, HashSet::new(), Vec::new()),
        };

        let mut filter_properties = spec.to_legacy_filter_properties();
        filter_properties["config_options"] = Value::Object(Map::new());

        Self {
            request_context,
            spec,
            config,
            index: 0,
            group_updated,
            group_hosts,
            group_policies,
            request_spec: spec.to_legacy_request_spec(),
            filter_properties,
        }
    }

    /// Attach the scheduler options read for this call
    pub fn with_config_options(mut self, options: Value) -> Self {
        self.filter_properties["config_options"] = options;
        self
    }

    pub fn config_options(&self) -> &Value {
        &self.filter_properties["config_options"]
    }

    /// Record a host chosen for this batch in the server group host set.
    ///
    /// Only called after a round finishes, so the update is visible to
    /// filters from the next round on.
    pub fn record_group_host(&mut self, host: &str) -> bool {
        if !self.group_updated || !self.group_hosts.insert(host.to_string()) {
            return false;
        }
        if let Some(legacy) = self
            .filter_properties
            .get_mut("group_hosts")
            .and_then(Value::as_array_mut)
        {
            legacy.push(Value::from(host));
        }
        true
    }
}

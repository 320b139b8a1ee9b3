//! Host state provider backed by a fixed fleet

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;
use tracing::debug;
use vmsched_core::{HostKey, HostState, RequestContext, SchedError, SchedResult};

use crate::traits::HostStateProvider;

/// Serves a private copy of a fixed fleet to every call.
///
/// Hosts invalidated by a failed batch are reported as stale until
/// [`StaticHostStateProvider::refresh`] replaces them.
#[derive(Debug, Default)]
pub struct StaticHostStateProvider {
    hosts: RwLock<Vec<HostState>>,
    stale: RwLock<HashSet<HostKey>>,
}

impl StaticHostStateProvider {
    pub fn new(hosts: Vec<HostState>) -> Self {
        Self {
            hosts: RwLock::new(hosts),
            stale: RwLock::new(HashSet::new()),
        }
    }

    /// Replace the fleet and clear the stale set
    pub fn refresh(&self, hosts: Vec<HostState>) -> SchedResult<()> {
        *self.hosts.write().map_err(poisoned)? = hosts;
        self.stale.write().map_err(poisoned)?.clear();
        Ok(())
    }

    /// Hosts invalidated since the last refresh
    pub fn stale_hosts(&self) -> SchedResult<Vec<HostKey>> {
        let mut keys: Vec<HostKey> = self.stale.read().map_err(poisoned)?.iter().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

fn poisoned<T>(_: T) -> SchedError {
    SchedError::HostState("host state lock poisoned".to_string())
}

#[async_trait]
impl HostStateProvider for StaticHostStateProvider {
    async fn get_all_host_states(&self, _ctx: &RequestContext) -> SchedResult<Vec<HostState>> {
        let stale = self.stale.read().map_err(poisoned)?;
        let hosts = self.hosts.read().map_err(poisoned)?;
        Ok(hosts
            .iter()
            .map(|h| {
                let mut copy = h.clone();
                if stale.contains(&copy.key()) {
                    copy.invalidate();
                }
                copy
            })
            .collect())
    }

    async fn invalidate(&self, _ctx: &RequestContext, hosts: &[HostKey]) -> SchedResult<()> {
        debug!(count = hosts.len(), "Marking hosts stale");
        self.stale.write().map_err(poisoned)?.extend(hosts.iter().cloned());
        Ok(())
    }
}

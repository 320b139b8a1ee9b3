//! Host state snapshots, the consumption model, and placement results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::request::RequestSpec;

/// Identity of one compute node within the fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey {
    pub host: String,
    pub nodename: String,
}

impl HostKey {
    pub fn new(host: impl Into<String>, nodename: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            nodename: nodename.into(),
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.host, self.nodename)
    }
}

/// Oversubscription limits computed by filters for a host.
///
/// Opaque to the scheduler; handed back to the caller with each destination
/// so the compute side can enforce the same limits on claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub memory_mb: Option<f64>,
    pub disk_gb: Option<f64>,
    pub vcpu: Option<f64>,
    pub numa_topology: Option<serde_json::Value>,
}

/// Mutable snapshot of one host's capacity and metadata.
///
/// A snapshot is owned by exactly one scheduling call. Free capacity only
/// ever decreases while the call runs; it may go negative on oversubscribed
/// hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    pub host: String,
    pub nodename: String,
    #[serde(default)]
    pub total_usable_ram_mb: i64,
    pub free_ram_mb: i64,
    #[serde(default)]
    pub total_usable_disk_gb: i64,
    pub free_disk_mb: i64,
    pub vcpus_total: u32,
    #[serde(default)]
    pub vcpus_used: u32,
    #[serde(default)]
    pub num_instances: u32,
    #[serde(default)]
    pub num_io_ops: u32,
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Aggregate metadata the host belongs to
    #[serde(default)]
    pub aggregates: HashMap<String, String>,
    #[serde(default)]
    pub limits: Limits,
    /// When this snapshot was last refreshed or consumed from.
    /// `None` forces a reload from the authoritative store.
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
}

impl HostState {
    /// Create an empty snapshot with the given capacity
    pub fn new(
        host: impl Into<String>,
        nodename: impl Into<String>,
        ram_mb: i64,
        disk_gb: i64,
        vcpus: u32,
    ) -> Self {
        Self {
            host: host.into(),
            nodename: nodename.into(),
            total_usable_ram_mb: ram_mb,
            free_ram_mb: ram_mb,
            total_usable_disk_gb: disk_gb,
            free_disk_mb: disk_gb * 1024,
            vcpus_total: vcpus,
            vcpus_used: 0,
            num_instances: 0,
            num_io_ops: 0,
            availability_zone: None,
            aggregates: HashMap::new(),
            limits: Limits::default(),
            updated: Some(Utc::now()),
        }
    }

    pub fn key(&self) -> HostKey {
        HostKey::new(self.host.clone(), self.nodename.clone())
    }

    pub fn free_vcpus(&self) -> i64 {
        i64::from(self.vcpus_total) - i64::from(self.vcpus_used)
    }

    /// Debit the footprint of one instance of `spec` from this snapshot.
    ///
    /// Does not check that the host can actually fit the instance; the
    /// filter chain decides eligibility before a host is chosen.
    pub fn consume_from_request(&mut self, spec: &RequestSpec) {
        let flavor = &spec.flavor;
        let ram_mb = i64::try_from(flavor.memory_mb).unwrap_or(i64::MAX);
        let disk_mb = i64::try_from(flavor.disk_mb()).unwrap_or(i64::MAX);

        self.free_ram_mb = self.free_ram_mb.saturating_sub(ram_mb);
        self.free_disk_mb = self.free_disk_mb.saturating_sub(disk_mb);
        self.vcpus_used = self.vcpus_used.saturating_add(flavor.vcpus);
        self.num_instances = self.num_instances.saturating_add(1);
        self.num_io_ops = self.num_io_ops.saturating_add(1);
        self.updated = Some(Utc::now());
    }

    /// Drop the freshness marker so the next user reloads this host
    pub fn invalidate(&mut self) {
        self.updated = None;
    }

    pub fn is_fresh(&self) -> bool {
        self.updated.is_some()
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) ram: {}MB disk: {}MB io_ops: {} instances: {}",
            self.host,
            self.nodename,
            self.free_ram_mb,
            self.free_disk_mb,
            self.num_io_ops,
            self.num_instances
        )
    }
}

/// One placement decision returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    pub nodename: String,
    pub limits: Limits,
}

impl From<&HostState> for Destination {
    fn from(state: &HostState) -> Self {
        Self {
            host: state.host.clone(),
            nodename: state.nodename.clone(),
            limits: state.limits.clone(),
        }
    }
}

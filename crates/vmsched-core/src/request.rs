//! Request descriptor and request spec definitions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::host::HostKey;
use crate::{SchedError, SchedResult};

/// Raw placement request as received from the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestDescriptor {
    /// Number of identical instances to place (defaults to 1)
    pub num_instances: Option<u32>,
    /// Resource footprint of one instance
    pub flavor: Flavor,
    /// Image the instances boot from
    pub image: ImageMeta,
    /// Requested availability zone
    pub availability_zone: Option<String>,
    /// Server group the instances join
    pub instance_group: Option<InstanceGroup>,
    /// Free-form hints consumed by filters
    pub scheduler_hints: HashMap<String, Value>,
    /// Hosts that must not be considered
    pub ignore_hosts: Vec<String>,
    /// Hosts that must be used, bypassing filters
    pub force_hosts: Vec<String>,
    /// Nodes that must be used, bypassing filters
    pub force_nodes: Vec<String>,
    /// Previous attempts for this request
    pub retry: Option<RetryInfo>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

/// Resource footprint of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flavor {
    pub name: String,
    pub memory_mb: u64,
    pub vcpus: u32,
    pub root_gb: u64,
    pub ephemeral_gb: u64,
    pub swap_mb: u64,
    pub extra_specs: HashMap<String, String>,
}

impl Default for Flavor {
    fn default() -> Self {
        Self {
            name: "m1.tiny".to_string(),
            memory_mb: 512,
            vcpus: 1,
            root_gb: 1,
            ephemeral_gb: 0,
            swap_mb: 0,
            extra_specs: HashMap::new(),
        }
    }
}

impl Flavor {
    /// Disk consumed by one instance, in MB
    pub fn disk_mb(&self) -> u64 {
        (self.root_gb + self.ephemeral_gb) * 1024 + self.swap_mb
    }
}

/// Image reference and properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageMeta {
    pub id: Option<String>,
    pub properties: HashMap<String, String>,
}

/// Server group membership constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub uuid: Uuid,
    pub policies: Vec<GroupPolicy>,
    /// Hosts already used by members of the group
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Placement policy of a server group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupPolicy {
    Affinity,
    AntiAffinity,
    SoftAffinity,
    SoftAntiAffinity,
}

impl std::fmt::Display for GroupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupPolicy::Affinity => write!(f, "affinity"),
            GroupPolicy::AntiAffinity => write!(f, "anti-affinity"),
            GroupPolicy::SoftAffinity => write!(f, "soft-affinity"),
            GroupPolicy::SoftAntiAffinity => write!(f, "soft-anti-affinity"),
        }
    }
}

/// Record of earlier scheduling attempts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryInfo {
    pub num_attempts: u32,
    /// Hosts tried by earlier attempts
    pub hosts: Vec<HostKey>,
}

/// Frozen description of one batch, built once per scheduling call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub num_instances: u32,
    pub flavor: Flavor,
    pub image: ImageMeta,
    pub availability_zone: Option<String>,
    pub instance_group: Option<InstanceGroup>,
    pub scheduler_hints: HashMap<String, Value>,
    pub ignore_hosts: Vec<String>,
    pub force_hosts: Vec<String>,
    pub force_nodes: Vec<String>,
    pub retry: Option<RetryInfo>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

impl RequestSpec {
    /// Validate a raw request and freeze it into a spec
    pub fn from_descriptor(desc: RequestDescriptor) -> SchedResult<Self> {
        let num_instances = desc.num_instances.unwrap_or(1);
        if num_instances == 0 {
            return Err(SchedError::InvalidRequest(
                "num_instances must be at least 1".to_string(),
            ));
        }
        if let Some(group) = &desc.instance_group {
            if group.policies.is_empty() {
                return Err(SchedError::InvalidRequest(format!(
                    "instance group {} has no policies",
                    group.uuid
                )));
            }
        }

        Ok(Self {
            num_instances,
            flavor: desc.flavor,
            image: desc.image,
            availability_zone: desc.availability_zone,
            instance_group: desc.instance_group,
            scheduler_hints: desc.scheduler_hints,
            ignore_hosts: desc.ignore_hosts,
            force_hosts: desc.force_hosts,
            force_nodes: desc.force_nodes,
            retry: desc.retry,
            project_id: desc.project_id,
            user_id: desc.user_id,
        })
    }

    /// Request description in the flat shape older filters and the
    /// notification payloads expect. Contains no fleet information.
    pub fn to_legacy_request_spec(&self) -> Value {
        json!({
            "num_instances": self.num_instances,
            "image": self.image,
            "instance_type": self.flavor,
            "instance_properties": {
                "project_id": self.project_id,
                "user_id": self.user_id,
                "availability_zone": self.availability_zone,
                "memory_mb": self.flavor.memory_mb,
                "vcpus": self.flavor.vcpus,
                "root_gb": self.flavor.root_gb,
                "ephemeral_gb": self.flavor.ephemeral_gb,
                "swap": self.flavor.swap_mb,
            },
        })
    }

    /// Filter properties view of the request
    pub fn to_legacy_filter_properties(&self) -> Value {
        let mut props = json!({
            "instance_type": self.flavor,
            "scheduler_hints": self.scheduler_hints,
            "ignore_hosts": self.ignore_hosts,
            "force_hosts": self.force_hosts,
            "force_nodes": self.force_nodes,
            "project_id": self.project_id,
            "user_id": self.user_id,
        });
        if let Some(retry) = &self.retry {
            props["retry"] = json!(retry);
        }
        if let Some(group) = &self.instance_group {
            props["group_updated"] = json!(true);
            props["group_hosts"] = json!(group.hosts);
            props["group_policies"] = json!(group.policies);
            props["group_members"] = json!(group.members);
        }
        props
    }
}

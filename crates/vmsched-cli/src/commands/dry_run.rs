//! Filters and weighers used by `vmsched select`

use vmsched_core::HostState;
use vmsched_scheduler::{FilterContext, HostFilter, HostWeigher};

/// Passes hosts with room for one instance of the requested flavor,
/// honoring any oversubscription limits recorded on the host
pub struct ResourceFitFilter;

impl ResourceFitFilter {
    fn usable_ram_mb(host: &HostState) -> i64 {
        match host.limits.memory_mb {
            Some(limit) => {
                let used = host.total_usable_ram_mb - host.free_ram_mb;
                limit as i64 - used
            }
            None => host.free_ram_mb,
        }
    }

    fn usable_disk_mb(host: &HostState) -> i64 {
        match host.limits.disk_gb {
            Some(limit) => {
                let used = host.total_usable_disk_gb * 1024 - host.free_disk_mb;
                (limit * 1024.0) as i64 - used
            }
            None => host.free_disk_mb,
        }
    }

    fn usable_vcpus(host: &HostState) -> i64 {
        match host.limits.vcpu {
            Some(limit) => limit as i64 - i64::from(host.vcpus_used),
            None => host.free_vcpus(),
        }
    }
}

impl HostFilter for ResourceFitFilter {
    fn name(&self) -> &'static str {
        "ResourceFitFilter"
    }

    fn host_passes(&self, host: &HostState, ctx: &FilterContext<'_>) -> bool {
        let flavor = &ctx.spec.flavor;
        Self::usable_ram_mb(host) >= flavor.memory_mb as i64
            && Self::usable_disk_mb(host) >= flavor.disk_mb() as i64
            && Self::usable_vcpus(host) >= i64::from(flavor.vcpus)
    }
}

/// Prefers hosts with more free RAM (spreading). A negative multiplier
/// stacks instances instead.
pub struct FreeRamWeigher {
    pub multiplier: f64,
}

impl Default for FreeRamWeigher {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

impl HostWeigher for FreeRamWeigher {
    fn name(&self) -> &'static str {
        "FreeRamWeigher"
    }

    fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn weigh(&self, host: &HostState, _ctx: &FilterContext<'_>) -> f64 {
        host.free_ram_mb as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmsched_core::{Flavor, RequestContext, RequestDescriptor, RequestSpec, SchedulerConfig};

    fn passes(host: &HostState, flavor: Flavor) -> bool {
        let rctx = RequestContext::default();
        let spec = RequestSpec::from_descriptor(RequestDescriptor {
            flavor,
            ..Default::default()
        })
        .unwrap();
        let config = SchedulerConfig::default();
        let ctx = FilterContext::new(&rctx, &spec, &config);
        ResourceFitFilter.host_passes(host, &ctx)
    }

    fn flavor(ram: u64, vcpus: u32) -> Flavor {
        Flavor {
            memory_mb: ram,
            vcpus,
            root_gb: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_fits_free_resources() {
        let host = HostState::new("h1", "n1", 2048, 10, 2);
        assert!(passes(&host, flavor(2048, 2)));
        assert!(!passes(&host, flavor(2049, 2)));
        assert!(!passes(&host, flavor(1024, 3)));
    }

    #[test]
    fn test_memory_limit_allows_oversubscription() {
        let mut host = HostState::new("h1", "n1", 2048, 10, 2);
        host.free_ram_mb = 0;
        assert!(!passes(&host, flavor(1024, 1)));

        host.limits.memory_mb = Some(3072.0);
        assert!(passes(&host, flavor(1024, 1)));
    }

    #[test]
    fn test_vcpu_limit() {
        let mut host = HostState::new("h1", "n1", 8192, 10, 2);
        host.limits.vcpu = Some(8.0);
        assert!(passes(&host, flavor(512, 6)));
    }
}

//! End-to-end tests for batch placement through `FilterScheduler`

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use vmsched_core::{
    Flavor, HostKey, HostState, InstanceGroup, GroupPolicy, RequestContext, RequestDescriptor,
    SchedError, SchedResult, SchedulerConfig,
};
use vmsched_scheduler::{
    FilterContext, FilterHandler, FilterScheduler, HostFilter, HostStateProvider, HostWeigher,
    Notifier, StaticHostStateProvider, WeightHandler, SELECT_DESTINATIONS_END,
    SELECT_DESTINATIONS_START,
};

/// Passes hosts with enough free RAM, disk and vCPUs for one instance
struct ResourceFit;

impl HostFilter for ResourceFit {
    fn name(&self) -> &'static str {
        "ResourceFit"
    }

    fn host_passes(&self, host: &HostState, ctx: &FilterContext<'_>) -> bool {
        let flavor = &ctx.spec.flavor;
        host.free_ram_mb >= flavor.memory_mb as i64
            && host.free_disk_mb >= flavor.disk_mb() as i64
            && host.free_vcpus() >= i64::from(flavor.vcpus)
    }
}

/// Rejects hosts already used by the server group
struct AntiAffinity;

impl HostFilter for AntiAffinity {
    fn name(&self) -> &'static str {
        "AntiAffinity"
    }

    fn host_passes(&self, host: &HostState, ctx: &FilterContext<'_>) -> bool {
        !ctx.group_policies.contains(&GroupPolicy::AntiAffinity)
            || !ctx.group_hosts.contains(&host.host)
    }
}

struct FreeRam;

impl HostWeigher for FreeRam {
    fn name(&self) -> &'static str {
        "FreeRam"
    }

    fn weigh(&self, host: &HostState, _ctx: &FilterContext<'_>) -> f64 {
        host.free_ram_mb as f64
    }
}

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingNotifier {
    fn event_types(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn info(&self, _ctx: &RequestContext, event_type: &str, payload: Value) -> SchedResult<()> {
        self.events.lock().unwrap().push((event_type.to_string(), payload));
        Ok(())
    }
}

struct BrokenProvider;

#[async_trait]
impl HostStateProvider for BrokenProvider {
    async fn get_all_host_states(&self, _ctx: &RequestContext) -> SchedResult<Vec<HostState>> {
        Err(SchedError::HostState("inventory unavailable".to_string()))
    }
}

/// Serves a fixed fleet but cannot invalidate
struct NoInvalidateProvider {
    hosts: Vec<HostState>,
}

#[async_trait]
impl HostStateProvider for NoInvalidateProvider {
    async fn get_all_host_states(&self, _ctx: &RequestContext) -> SchedResult<Vec<HostState>> {
        Ok(self.hosts.clone())
    }

    async fn invalidate(&self, _ctx: &RequestContext, _hosts: &[HostKey]) -> SchedResult<()> {
        Err(SchedError::HostState("cache unreachable".to_string()))
    }
}

/// Rejects hosts whose name is listed under `excluded_hosts` in the
/// scheduler options
struct OptionsExclusion;

impl HostFilter for OptionsExclusion {
    fn name(&self) -> &'static str {
        "OptionsExclusion"
    }

    fn host_passes(&self, host: &HostState, ctx: &FilterContext<'_>) -> bool {
        ctx.config_options()["excluded_hosts"]
            .as_array()
            .map_or(true, |names| !names.iter().any(|n| n == host.host.as_str()))
    }
}

struct Harness {
    scheduler: FilterScheduler,
    provider: Arc<StaticHostStateProvider>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(hosts: Vec<HostState>, subset: i64, seed: u64) -> Harness {
    let provider = Arc::new(StaticHostStateProvider::new(hosts));
    let notifier = Arc::new(RecordingNotifier::default());
    let scheduler = FilterScheduler::new(
        SchedulerConfig {
            host_subset_size: subset,
            ..Default::default()
        },
        provider.clone(),
        Arc::new(
            FilterHandler::default()
                .with_filter(ResourceFit)
                .with_filter(AntiAffinity),
        ),
        Arc::new(WeightHandler::default().with_weigher(FreeRam)),
        notifier.clone(),
    )
    .with_rng_seed(seed);

    Harness {
        scheduler,
        provider,
        notifier,
    }
}

fn fleet(rams: &[i64]) -> Vec<HostState> {
    rams.iter()
        .enumerate()
        .map(|(i, &ram)| {
            HostState::new(format!("compute-{}", i), format!("node-{}", i), ram, 1000, 64)
        })
        .collect()
}

fn request(num: u32, ram: u64) -> RequestDescriptor {
    RequestDescriptor {
        num_instances: Some(num),
        flavor: Flavor {
            name: "test.flavor".to_string(),
            memory_mb: ram,
            vcpus: 1,
            root_gb: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn hosts_of(dests: &[vmsched_core::Destination]) -> Vec<String> {
    dests.iter().map(|d| d.host.clone()).collect()
}

#[tokio::test]
async fn test_exact_count_of_distinct_hosts() {
    // Each host fits exactly one instance.
    let h = harness(fleet(&[1024; 6]), 3, 17);

    let dests = h
        .scheduler
        .select_destinations(&RequestContext::default(), request(4, 1024))
        .await
        .unwrap();

    let mut names = hosts_of(&dests);
    assert_eq!(names.len(), 4);
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 4);
}

#[tokio::test]
async fn test_highest_weighed_hosts_in_weight_order() {
    let h = harness(fleet(&[10000, 9800, 9600, 9400, 9200]), 1, 1);

    let dests = h
        .scheduler
        .select_destinations(&RequestContext::default(), request(4, 1000))
        .await
        .unwrap();

    assert_eq!(
        hosts_of(&dests),
        vec!["compute-0", "compute-1", "compute-2", "compute-3"]
    );
}

#[tokio::test]
async fn test_top_host_reused_while_it_stays_best() {
    let h = harness(fleet(&[20000, 9000, 8000, 7000, 6000]), 1, 1);

    let dests = h
        .scheduler
        .select_destinations(&RequestContext::default(), request(4, 1000))
        .await
        .unwrap();

    assert_eq!(hosts_of(&dests), vec!["compute-0"; 4]);
}

#[tokio::test]
async fn test_host_excluded_once_capacity_is_consumed() {
    // compute-0 fits two instances, then drops out; compute-1 fits one.
    let h = harness(fleet(&[2048, 1024]), 1, 1);

    let dests = h
        .scheduler
        .select_destinations(&RequestContext::default(), request(3, 1024))
        .await
        .unwrap();

    assert_eq!(hosts_of(&dests), vec!["compute-0", "compute-0", "compute-1"]);
}

#[tokio::test]
async fn test_insufficient_hosts_fail_and_invalidate() {
    let h = harness(fleet(&[1024, 1024, 1024]), 1, 1);

    let err = h
        .scheduler
        .select_destinations(&RequestContext::default(), request(5, 1024))
        .await
        .unwrap_err();

    assert!(err.is_no_valid_host());
    assert!(!err.to_string().contains('3'));
    assert_eq!(
        h.provider.stale_hosts().unwrap(),
        vec![
            HostKey::new("compute-0", "node-0"),
            HostKey::new("compute-1", "node-1"),
            HostKey::new("compute-2", "node-2"),
        ]
    );

    // Only the start event is emitted for a failed batch.
    assert_eq!(h.notifier.event_types(), vec![SELECT_DESTINATIONS_START]);
}

#[tokio::test]
async fn test_success_emits_start_and_end() {
    let h = harness(fleet(&[4096, 4096]), 1, 1);

    h.scheduler
        .select_destinations(&RequestContext::default(), request(2, 1024))
        .await
        .unwrap();

    assert_eq!(
        h.notifier.event_types(),
        vec![SELECT_DESTINATIONS_START, SELECT_DESTINATIONS_END]
    );
    assert!(h.provider.stale_hosts().unwrap().is_empty());

    for (_, payload) in h.notifier.events.lock().unwrap().iter() {
        assert_eq!(payload["request_spec"]["num_instances"], 2);
        assert!(!payload.to_string().contains("compute-"));
    }
}

#[tokio::test]
async fn test_fixed_seed_repeats_host_sequence() {
    let run = |seed| async move {
        let h = harness(fleet(&[8192, 8192, 8192, 8192, 8192]), 1, seed);
        hosts_of(
            &h.scheduler
                .select_destinations(&RequestContext::default(), request(4, 512))
                .await
                .unwrap(),
        )
    };

    let first = run(5).await;
    assert_eq!(first, run(5).await);
    assert_eq!(first, run(99).await);
}

#[tokio::test]
async fn test_seeded_subset_pick_is_reproducible() {
    let run = |seed| async move {
        let h = harness(fleet(&[8192, 8100, 8000, 7900, 7800]), 5, seed);
        let mut picks = Vec::new();
        for _ in 0..3 {
            picks.push(hosts_of(
                &h.scheduler
                    .select_destinations(&RequestContext::default(), request(3, 512))
                    .await
                    .unwrap(),
            ));
        }
        picks
    };

    assert_eq!(run(1234).await, run(1234).await);
}

#[tokio::test]
async fn test_anti_affinity_group_spreads_hosts() {
    let h = harness(fleet(&[8192, 8192, 8192]), 1, 1);
    let mut req = request(3, 512);
    req.instance_group = Some(InstanceGroup {
        uuid: uuid::Uuid::new_v4(),
        policies: vec![GroupPolicy::AntiAffinity],
        hosts: Vec::new(),
        members: Vec::new(),
    });

    let dests = h
        .scheduler
        .select_destinations(&RequestContext::default(), req)
        .await
        .unwrap();

    let mut names = hosts_of(&dests);
    names.sort();
    assert_eq!(names, vec!["compute-0", "compute-1", "compute-2"]);
}

#[tokio::test]
async fn test_anti_affinity_group_runs_out_of_hosts() {
    let h = harness(fleet(&[8192, 8192]), 1, 1);
    let mut req = request(3, 512);
    req.instance_group = Some(InstanceGroup {
        uuid: uuid::Uuid::new_v4(),
        policies: vec![GroupPolicy::AntiAffinity],
        hosts: Vec::new(),
        members: Vec::new(),
    });

    let err = h
        .scheduler
        .select_destinations(&RequestContext::default(), req)
        .await
        .unwrap_err();

    assert!(err.is_no_valid_host());
    assert_eq!(h.provider.stale_hosts().unwrap().len(), 2);
}

#[tokio::test]
async fn test_provider_error_propagates() {
    let scheduler = FilterScheduler::new(
        SchedulerConfig::default(),
        Arc::new(BrokenProvider),
        Arc::new(FilterHandler::default()),
        Arc::new(WeightHandler::default()),
        Arc::new(RecordingNotifier::default()),
    );

    let err = scheduler
        .select_destinations(&RequestContext::default(), request(1, 512))
        .await
        .unwrap_err();

    assert!(matches!(err, SchedError::HostState(_)));
}

#[tokio::test]
async fn test_cancelled_call_aborts() {
    let h = harness(fleet(&[8192]), 1, 1);
    let token = CancellationToken::new();
    token.cancel();
    let ctx = RequestContext::default().with_cancellation(token);

    let err = h
        .scheduler
        .select_destinations(&ctx, request(2, 512))
        .await
        .unwrap_err();

    assert!(matches!(err, SchedError::Cancelled));
    assert_eq!(h.notifier.event_types(), vec![SELECT_DESTINATIONS_START]);
}

#[tokio::test]
async fn test_concurrent_calls_use_private_snapshots() {
    // Each call alone fits; sharing a snapshot would over-allocate.
    let h = harness(fleet(&[2048, 2048]), 2, 3);
    let scheduler = Arc::new(h.scheduler);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .select_destinations(&RequestContext::default(), request(4, 1024))
                .await
        }));
    }

    for handle in handles {
        let dests = handle.await.unwrap().unwrap();
        assert_eq!(dests.len(), 4);
    }
}

#[tokio::test]
async fn test_failed_invalidate_keeps_no_valid_host() {
    let scheduler = FilterScheduler::new(
        SchedulerConfig::default(),
        Arc::new(NoInvalidateProvider {
            hosts: fleet(&[1024]),
        }),
        Arc::new(FilterHandler::default().with_filter(ResourceFit)),
        Arc::new(WeightHandler::default()),
        Arc::new(RecordingNotifier::default()),
    );

    let err = scheduler
        .select_destinations(&RequestContext::default(), request(2, 1024))
        .await
        .unwrap_err();

    assert!(err.is_no_valid_host());
}

#[tokio::test]
async fn test_filters_see_options_file() {
    let path = std::env::temp_dir().join(format!(
        "vmsched-select-options-{}.json",
        std::process::id()
    ));
    std::fs::write(&path, r#"{"excluded_hosts": ["compute-0"]}"#).unwrap();

    let scheduler = FilterScheduler::new(
        SchedulerConfig {
            json_config_location: Some(path.clone()),
            ..Default::default()
        },
        Arc::new(StaticHostStateProvider::new(fleet(&[8192, 4096]))),
        Arc::new(FilterHandler::default().with_filter(OptionsExclusion)),
        Arc::new(WeightHandler::default().with_weigher(FreeRam)),
        Arc::new(RecordingNotifier::default()),
    );

    let dests = scheduler
        .select_destinations(&RequestContext::default(), request(1, 512))
        .await
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(hosts_of(&dests), vec!["compute-1"]);
}

//! Round-by-round placement of one batch against a host snapshot

use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};
use vmsched_core::{Destination, HostKey, HostState, SchedError, SchedResult};

use crate::filter_context::FilterContext;
use crate::traits::{FilterChain, WeighedHost, WeigherChain};

/// How a placement run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// Every requested instance has a host
    Complete,
    /// A round filtered out every remaining host
    Insufficient,
    /// The request context was cancelled between rounds
    Cancelled,
}

/// Host chosen in one round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedHost {
    /// Position of the host in the placement snapshot
    pub slot: usize,
    /// Round (instance index) the host was chosen for
    pub round: u32,
    /// Weight the host had when it was chosen
    pub weight: f64,
}

/// Result of running the placement loop over one snapshot
#[derive(Debug, Clone)]
pub struct Placement {
    hosts: Vec<HostState>,
    selected: Vec<SelectedHost>,
    requested: u32,
    outcome: PlacementOutcome,
}

impl Placement {
    /// Selected hosts in assignment order
    pub fn selected(&self) -> &[SelectedHost] {
        &self.selected
    }

    /// The snapshot after consumption, one entry per distinct host
    pub fn hosts(&self) -> &[HostState] {
        &self.hosts
    }

    pub fn host(&self, selected: &SelectedHost) -> &HostState {
        &self.hosts[selected.slot]
    }

    pub fn selected_hosts(&self) -> impl Iterator<Item = &HostState> + '_ {
        self.selected.iter().map(|s| &self.hosts[s.slot])
    }

    pub fn requested(&self) -> u32 {
        self.requested
    }

    pub fn outcome(&self) -> PlacementOutcome {
        self.outcome
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == PlacementOutcome::Complete
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.selected_hosts().map(Destination::from).collect()
    }

    /// Clear the freshness marker of every selected host.
    ///
    /// Returns the distinct keys of the invalidated hosts, in first
    /// selection order.
    pub fn invalidate_selected(&mut self) -> Vec<HostKey> {
        let mut keys = Vec::new();
        for sel in &self.selected {
            let host = &mut self.hosts[sel.slot];
            host.invalidate();
            let key = host.key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Pick one host uniformly among the best `subset_size` weighed hosts.
///
/// `subset_size` is clamped to `1..=weighed.len()`. Returns `None` only for
/// an empty list.
pub fn pick_from_subset<'w, 'h, R>(
    weighed: &'w [WeighedHost<'h>],
    subset_size: usize,
    rng: &mut R,
) -> Option<&'w WeighedHost<'h>>
where
    R: Rng + ?Sized,
{
    let size = subset_size.clamp(1, weighed.len().max(1));
    weighed[..size.min(weighed.len())].choose(rng)
}

/// Drop repeated `(host, nodename)` entries, keeping the first
fn index_snapshot(hosts: Vec<HostState>) -> (Vec<HostState>, HashMap<HostKey, usize>) {
    let mut slots = HashMap::with_capacity(hosts.len());
    let mut unique = Vec::with_capacity(hosts.len());

    for host in hosts {
        match slots.entry(host.key()) {
            Entry::Occupied(e) => {
                warn!(host = %e.key(), "Duplicate host in snapshot, keeping first entry");
            }
            Entry::Vacant(e) => {
                e.insert(unique.len());
                unique.push(host);
            }
        }
    }

    (unique, slots)
}

fn slot_of(slots: &HashMap<HostKey, usize>, host: &HostState) -> SchedResult<usize> {
    slots.get(&host.key()).copied().ok_or_else(|| {
        SchedError::Internal(format!(
            "host {} returned by a collaborator is not part of the snapshot",
            host.key()
        ))
    })
}

fn host_list(hosts: &[&HostState]) -> String {
    hosts
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn weighed_list(weighed: &[WeighedHost<'_>]) -> String {
    weighed
        .iter()
        .map(|w| format!("{}: {:.3}", w.host.key(), w.weight))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run filter, weigh, pick and consume once per requested instance.
///
/// `hosts` is the complete snapshot for this call; it is walked as a
/// single materialized list and never re-fetched. Each round starts from
/// the hosts that passed the previous round's filters, so the candidate
/// list only narrows. A short placement is returned, not raised; the
/// caller decides whether the batch failed. Collaborator errors propagate.
///
/// `fctx` carries the request, configuration and per-call options; it is
/// updated with the round index and group hosts as the loop advances.
pub fn place_batch<R>(
    mut fctx: FilterContext<'_>,
    filters: &dyn FilterChain,
    weighers: &dyn WeigherChain,
    hosts: Vec<HostState>,
    rng: &mut R,
) -> SchedResult<Placement>
where
    R: Rng + ?Sized,
{
    let ctx = fctx.request_context;
    let spec = fctx.spec;
    let config = fctx.config;
    let (mut hosts, slots) = index_snapshot(hosts);
    let mut candidates: Vec<usize> = (0..hosts.len()).collect();
    let mut selected: Vec<SelectedHost> = Vec::with_capacity(spec.num_instances as usize);
    let mut outcome = PlacementOutcome::Complete;

    for round in 0..spec.num_instances {
        if ctx.is_cancelled() {
            debug!(request_id = %ctx.request_id, round, "Placement cancelled");
            outcome = PlacementOutcome::Cancelled;
            break;
        }
        fctx.index = round;

        let current: Vec<&HostState> = candidates.iter().map(|&slot| &hosts[slot]).collect();
        let filtered = filters.get_filtered_hosts(current, &fctx, round)?;
        if filtered.is_empty() {
            debug!(round, "No hosts left after filtering");
            outcome = PlacementOutcome::Insufficient;
            break;
        }
        debug!(round, hosts = %host_list(&filtered), "Filtered hosts");

        let next: Vec<usize> = filtered
            .iter()
            .map(|h| slot_of(&slots, h))
            .collect::<SchedResult<_>>()?;

        let weighed = weighers.get_weighed_hosts(filtered, &fctx)?;
        debug!(round, hosts = %weighed_list(&weighed), "Weighed hosts");

        let subset_size = config.effective_subset_size(weighed.len());
        let chosen = pick_from_subset(&weighed, subset_size, rng).ok_or_else(|| {
            SchedError::Weigher("weigher chain returned no hosts".to_string())
        })?;
        let slot = slot_of(&slots, chosen.host)?;
        let weight = chosen.weight;
        debug!(round, host = %chosen.host, subset_size, "Selected host");

        selected.push(SelectedHost {
            slot,
            round,
            weight,
        });

        // Consume so the next round's filters and weighers see the debit.
        let host = &mut hosts[slot];
        host.consume_from_request(spec);
        fctx.record_group_host(&host.host);

        candidates = next;
    }

    Ok(Placement {
        hosts,
        selected,
        requested: spec.num_instances,
        outcome,
    })
}

//! vmsched-scheduler: filter/weigh placement for vmsched
//!
//! This crate turns a batch request into a list of host assignments:
//! - Collaborator contracts (host state provider, filter and weigher chains, notifier)
//! - Generic filter and weigher handlers
//! - File-backed scheduler options visible to filters
//! - The round-by-round placement loop with randomized subset pick
//! - The all-or-nothing batch orchestrator

pub mod filter_context;
pub mod filter_handler;
pub mod notifier;
pub mod options;
pub mod placement;
pub mod provider;
pub mod scheduler;
pub mod traits;
pub mod weight_handler;

pub use filter_context::FilterContext;
pub use filter_handler::{FilterHandler, HostFilter};
pub use notifier::{
    ChannelNotifier, Notification, TracingNotifier, SELECT_DESTINATIONS_END,
    SELECT_DESTINATIONS_START,
};
pub use options::SchedulerOptions;
pub use placement::{pick_from_subset, Placement, PlacementOutcome, SelectedHost};
pub use provider::StaticHostStateProvider;
pub use scheduler::FilterScheduler;
pub use traits::{FilterChain, HostStateProvider, Notifier, WeighedHost, WeigherChain};
pub use weight_handler::{HostWeigher, WeightHandler};

//! vmsched-core: Core types for the vmsched placement engine
//!
//! This crate provides the fundamental types used throughout vmsched:
//! - Request descriptors and the frozen request spec
//! - Host state snapshots and the consumption model
//! - Per-call request context
//! - Configuration types
//! - Error handling

pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod request;

pub use config::*;
pub use context::*;
pub use error::*;
pub use host::*;
pub use request::*;

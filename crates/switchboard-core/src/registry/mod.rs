//! Worker registry
//!
//! Read-only snapshots of every candidate worker together with their
//! pricing, certifications, capability flags, benchmark scores and current
//! readiness. Snapshots are produced by an upstream refresh cycle and
//! published through [`SharedRegistry`], which swaps an `Arc` pointer so
//! that concurrent selections never observe a half-refreshed catalog.

mod snapshot;
mod types;

pub use snapshot::{RegistrySnapshot, SharedRegistry, SnapshotSource};
pub use types::{
    Capability, CapabilitySet, Certification, ReadinessTier, SubscriptionTier, Worker,
    WorkerClass, WorkerStatus,
};

//! Switchboard Core Library
//!
//! This crate provides the core functionality for Switchboard, including:
//! - Worker registry snapshots with atomic refresh
//! - Weight profile catalog and resolution
//! - Domain classification of request content
//! - Eight-dimension worker scoring
//! - Filter, rank and select pipeline with a latency budget
//! - Learning-signal integration and selection traces

pub mod classifier;
pub mod config;
pub mod error;
pub mod learning;
pub mod profiles;
pub mod registry;
pub mod scoring;
pub mod selection;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::registry::{RegistrySnapshot, SharedRegistry, Worker};
    pub use crate::selection::{RequestContext, SelectionEngine, SelectionResult};
}

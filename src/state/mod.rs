//! State management module
//!
//! This module tracks restore runs that are currently executing

pub mod run_registry;

// Re-export commonly used state components
pub use run_registry::{CancelFlag, PauseGate, RunGuard, RunProgress, RunRegistry};

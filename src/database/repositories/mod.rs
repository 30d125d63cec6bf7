//! Database repositories module
//!
//! This module contains all repository implementations for data access

pub mod snapshot;
pub mod outcome;

// Re-export repositories
pub use snapshot::SnapshotRepository;
pub use outcome::OutcomeRepository;

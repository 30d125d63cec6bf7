//! Services module
//!
//! This module contains the snapshot, diff, planning and execution logic

pub mod clock;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod restore;
pub mod snapshot_store;

// Re-export commonly used services
pub use clock::{Clock, ManualClock, SystemClock};
pub use diff::diff;
pub use executor::{Executor, RetryPolicy};
pub use planner::plan;
pub use restore::{RestoreOutcome, RestoreRequest, RestoreService};
pub use snapshot_store::{fold, SnapshotStore};

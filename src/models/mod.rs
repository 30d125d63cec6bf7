//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod member;
pub mod snapshot;
pub mod delta;
pub mod plan;
pub mod outcome;

// Re-export commonly used models
pub use member::{GroupId, MemberId, MemberRecord, Role, Roster};
pub use snapshot::{CaptureMode, LiveRoster, MaterializedSnapshot, RosterPatch, RosterSummary, Snapshot, SnapshotContent, SnapshotMeta};
pub use delta::{Delta, FieldChange, MemberChange};
pub use plan::{Action, ActionKind, ActionTier, AttributeValue, PlanOptions, PlanSummary, RejectReason, RejectedChange, RestorePlan};
pub use outcome::{ActionOutcome, OutcomeStatus, RunId, RunReport, RunStatus, RunSummary, SkipReason, StorageFailure};

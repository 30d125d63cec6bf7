//! Action outcomes and run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::{GroupId, MemberId};
use super::plan::{Action, RejectedChange};
use crate::utils::errors::FailureKind;

/// Identity of one restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadySatisfied,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    Skipped { reason: SkipReason },
    Failed { kind: FailureKind, attempts: u32, message: String },
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Applied => "applied",
            OutcomeStatus::Skipped { .. } => "skipped",
            OutcomeStatus::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub status: OutcomeStatus,
    pub applied_at: Option<DateTime<Utc>>,
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
}

/// Outcome that could not be written to the audit store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFailure {
    pub position: usize,
    pub message: String,
}

/// Complete, plan-aligned result of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub group_id: GroupId,
    pub status: RunStatus,
    pub outcomes: Vec<ActionOutcome>,
    pub unreachable: Vec<MemberId>,
    pub rejected: Vec<RejectedChange>,
    pub storage_failures: Vec<StorageFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub progress_percent: f64,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let total = self.outcomes.len();
        let applied = self.outcomes.iter().filter(|o| o.is_applied()).count();
        let failed = self.outcomes.iter().filter(|o| o.is_failed()).count();
        let skipped = total - applied - failed;
        let processed = self
            .outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Skipped { reason: SkipReason::Cancelled })
            .count();
        let progress_percent = if total == 0 {
            100.0
        } else {
            (processed as f64 / total as f64) * 100.0
        };

        RunSummary { total, applied, skipped, failed, progress_percent }
    }
}

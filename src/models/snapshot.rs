//! Snapshot models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::member::{GroupId, MemberId, MemberRecord, Role, Roster};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Full,
    Incremental,
}

impl CaptureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Full => "full",
            CaptureMode::Incremental => "incremental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full" => Some(CaptureMode::Full),
            "incremental" => Some(CaptureMode::Incremental),
            _ => None,
        }
    }
}

/// Changes of one roster relative to its predecessor view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPatch {
    /// Complete records of members that joined or whose record changed
    pub upserts: Vec<MemberRecord>,
    pub removals: Vec<MemberId>,
}

impl RosterPatch {
    /// Patch turning `previous` into `current`
    pub fn between(previous: &Roster, current: &Roster) -> Self {
        let upserts = current
            .iter()
            .filter(|record| previous.get(record.id) != Some(*record))
            .cloned()
            .collect();
        let removals = previous.ids().filter(|id| !current.contains(*id)).collect();
        Self { upserts, removals }
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "data", rename_all = "lowercase")]
pub enum SnapshotContent {
    Full(Roster),
    Incremental(RosterPatch),
}

/// Member counts of a materialized roster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSummary {
    pub member_count: usize,
    pub owner_count: usize,
    pub admin_count: usize,
    /// Members added versus the previous view
    pub joined_count: usize,
    /// Members gone versus the previous view
    pub left_count: usize,
}

impl RosterSummary {
    pub fn of(roster: &Roster, joined_count: usize, left_count: usize) -> Self {
        Self {
            member_count: roster.len(),
            owner_count: roster.count_role(Role::Owner),
            admin_count: roster.count_role(Role::Admin),
            joined_count,
            left_count,
        }
    }
}

/// Descriptive part of a snapshot, listed by history queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub group_id: GroupId,
    pub sequence: u64,
    pub mode: CaptureMode,
    pub captured_at: DateTime<Utc>,
    pub summary: RosterSummary,
}

/// Immutable, persisted capture of a group's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub content: SnapshotContent,
}

impl Snapshot {
    pub fn group_id(&self) -> GroupId {
        self.meta.group_id
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    pub fn mode(&self) -> CaptureMode {
        self.meta.mode
    }
}

/// Snapshot resolved to its complete roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedSnapshot {
    pub meta: SnapshotMeta,
    pub roster: Roster,
}

/// Roster fetched from the remote group just now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRoster {
    pub group_id: GroupId,
    pub roster: Roster,
    pub fetched_at: DateTime<Utc>,
}

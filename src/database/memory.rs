//! In-memory persistence
//!
//! Same contract as the PostgreSQL backend, kept in process memory. Used for
//! tests and for running without a database. Individual writes can be made
//! to fail to exercise durability-error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::database::Persistence;
use crate::models::{ActionOutcome, GroupId, RunId, Snapshot, SnapshotMeta};
use crate::utils::errors::{StorageError, StorageResult};

#[derive(Debug, Default)]
struct MemoryState {
    snapshots: HashMap<GroupId, BTreeMap<u64, Snapshot>>,
    outcomes: HashMap<RunId, BTreeMap<usize, ActionOutcome>>,
    failing_outcome_positions: HashSet<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every outcome write at `position` fail
    pub fn fail_outcome_at(&self, position: usize) {
        self.lock().failing_outcome_positions.insert(position);
    }

    /// Drop a stored snapshot, simulating retention or data loss
    pub fn forget_snapshot(&self, group_id: GroupId, sequence: u64) -> bool {
        self.lock()
            .snapshots
            .get_mut(&group_id)
            .map(|snapshots| snapshots.remove(&sequence).is_some())
            .unwrap_or(false)
    }

    pub fn snapshot_count(&self, group_id: GroupId) -> usize {
        self.lock().snapshots.get(&group_id).map(BTreeMap::len).unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let mut state = self.lock();
        let snapshots = state.snapshots.entry(snapshot.group_id()).or_default();
        if snapshots.contains_key(&snapshot.sequence()) {
            return Err(StorageError::Conflict {
                group_id: snapshot.group_id(),
                sequence: snapshot.sequence(),
            });
        }
        snapshots.insert(snapshot.sequence(), snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, group_id: GroupId, sequence: u64) -> StorageResult<Option<Snapshot>> {
        Ok(self
            .lock()
            .snapshots
            .get(&group_id)
            .and_then(|snapshots| snapshots.get(&sequence))
            .cloned())
    }

    async fn latest_sequence(&self, group_id: GroupId) -> StorageResult<Option<u64>> {
        Ok(self
            .lock()
            .snapshots
            .get(&group_id)
            .and_then(|snapshots| snapshots.keys().next_back().copied()))
    }

    async fn list_snapshots(&self, group_id: GroupId, before: Option<u64>, limit: usize) -> StorageResult<Vec<SnapshotMeta>> {
        let state = self.lock();
        let Some(snapshots) = state.snapshots.get(&group_id) else {
            return Ok(Vec::new());
        };
        let upper = before.unwrap_or(u64::MAX);
        Ok(snapshots
            .range(..upper)
            .rev()
            .take(limit)
            .map(|(_, snapshot)| snapshot.meta.clone())
            .collect())
    }

    async fn save_outcome(&self, run_id: RunId, _group_id: GroupId, position: usize, outcome: &ActionOutcome) -> StorageResult<()> {
        let mut state = self.lock();
        if state.failing_outcome_positions.contains(&position) {
            return Err(StorageError::Unavailable(format!("write of outcome {} rejected", position)));
        }
        state.outcomes.entry(run_id).or_default().insert(position, outcome.clone());
        Ok(())
    }

    async fn load_outcomes(&self, run_id: RunId) -> StorageResult<Vec<ActionOutcome>> {
        Ok(self
            .lock()
            .outcomes
            .get(&run_id)
            .map(|outcomes| outcomes.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaptureMode, Roster, RosterSummary, SnapshotContent};
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn snapshot(sequence: u64) -> Snapshot {
        Snapshot {
            meta: SnapshotMeta {
                group_id: GroupId(1),
                sequence,
                mode: CaptureMode::Full,
                captured_at: Utc::now(),
                summary: RosterSummary::default(),
            },
            content: SnapshotContent::Full(Roster::new()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_sequence_conflicts() {
        let store = MemoryPersistence::new();
        store.save_snapshot(&snapshot(1)).await.unwrap();
        assert_matches!(
            store.save_snapshot(&snapshot(1)).await,
            Err(StorageError::Conflict { sequence: 1, .. })
        );
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let store = MemoryPersistence::new();
        for sequence in 1..=5 {
            store.save_snapshot(&snapshot(sequence)).await.unwrap();
        }

        let first: Vec<_> = store.list_snapshots(GroupId(1), None, 2).await.unwrap().iter().map(|m| m.sequence).collect();
        assert_eq!(first, vec![5, 4]);
        let next: Vec<_> = store.list_snapshots(GroupId(1), Some(4), 2).await.unwrap().iter().map(|m| m.sequence).collect();
        assert_eq!(next, vec![3, 2]);
        assert_eq!(store.latest_sequence(GroupId(1)).await.unwrap(), Some(5));
        assert!(store.list_snapshots(GroupId(2), None, 10).await.unwrap().is_empty());
    }
}

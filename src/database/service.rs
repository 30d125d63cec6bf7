//! Database service layer
//!
//! This module provides the PostgreSQL-backed [`Persistence`] implementation

use async_trait::async_trait;

use crate::database::{DatabasePool, OutcomeRepository, Persistence, SnapshotRepository};
use crate::models::{ActionOutcome, GroupId, RunId, Snapshot, SnapshotMeta};
use crate::utils::errors::StorageResult;
use crate::utils::logging::log_database_operation;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pub snapshots: SnapshotRepository,
    pub outcomes: OutcomeRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            snapshots: SnapshotRepository::new(pool.clone()),
            outcomes: OutcomeRepository::new(pool),
        }
    }
}

#[async_trait]
impl Persistence for DatabaseService {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let started = std::time::Instant::now();
        let result = self.snapshots.insert(snapshot).await;
        log_database_operation("insert", "snapshots", started.elapsed().as_millis() as u64, result.is_ok());
        result
    }

    async fn load_snapshot(&self, group_id: GroupId, sequence: u64) -> StorageResult<Option<Snapshot>> {
        self.snapshots.find(group_id, sequence).await
    }

    async fn latest_sequence(&self, group_id: GroupId) -> StorageResult<Option<u64>> {
        self.snapshots.latest_sequence(group_id).await
    }

    async fn list_snapshots(&self, group_id: GroupId, before: Option<u64>, limit: usize) -> StorageResult<Vec<SnapshotMeta>> {
        self.snapshots.list(group_id, before, limit).await
    }

    async fn save_outcome(&self, run_id: RunId, group_id: GroupId, position: usize, outcome: &ActionOutcome) -> StorageResult<()> {
        let started = std::time::Instant::now();
        let result = self.outcomes.upsert(run_id, group_id, position, outcome).await;
        log_database_operation("upsert", "action_outcomes", started.elapsed().as_millis() as u64, result.is_ok());
        result
    }

    async fn load_outcomes(&self, run_id: RunId) -> StorageResult<Vec<ActionOutcome>> {
        self.outcomes.find_by_run(run_id).await
    }
}

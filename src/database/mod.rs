//! Database module
//!
//! Durable storage for snapshots and action outcomes. The engine talks to
//! storage only through [`Persistence`]; PostgreSQL and in-memory backends
//! implement it.

pub mod connection;
pub mod memory;
pub mod repositories;
pub mod service;

// Re-export commonly used database components
pub use connection::{connect, create_pool, run_migrations, verify_schema, DatabaseConfig, DatabasePool};
pub use memory::MemoryPersistence;
pub use repositories::{SnapshotRepository, OutcomeRepository};
pub use service::DatabaseService;

use async_trait::async_trait;

use crate::models::{ActionOutcome, GroupId, RunId, Snapshot, SnapshotMeta};
use crate::utils::errors::StorageResult;

#[async_trait]
pub trait Persistence: Send + Sync {
    /// Append a snapshot; fails with `Conflict` if the sequence is taken
    async fn save_snapshot(&self, snapshot: &Snapshot) -> StorageResult<()>;

    async fn load_snapshot(&self, group_id: GroupId, sequence: u64) -> StorageResult<Option<Snapshot>>;

    async fn latest_sequence(&self, group_id: GroupId) -> StorageResult<Option<u64>>;

    /// Up to `limit` snapshot metadata entries with sequence below `before`
    /// (or from the newest when `None`), newest first
    async fn list_snapshots(&self, group_id: GroupId, before: Option<u64>, limit: usize) -> StorageResult<Vec<SnapshotMeta>>;

    async fn save_outcome(&self, run_id: RunId, group_id: GroupId, position: usize, outcome: &ActionOutcome) -> StorageResult<()>;

    async fn save_outcomes(&self, run_id: RunId, group_id: GroupId, outcomes: &[ActionOutcome]) -> StorageResult<()> {
        for (position, outcome) in outcomes.iter().enumerate() {
            self.save_outcome(run_id, group_id, position, outcome).await?;
        }
        Ok(())
    }

    /// Recorded outcomes of a run in plan order
    async fn load_outcomes(&self, run_id: RunId) -> StorageResult<Vec<ActionOutcome>>;
}

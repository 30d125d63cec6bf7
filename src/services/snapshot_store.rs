//! Snapshot store
//!
//! Captures rosters into append-only, per-group numbered snapshots and
//! resolves any snapshot back to its complete roster. Incremental snapshots
//! hold a [`RosterPatch`] against the previous materialized view and are
//! replayed with [`fold`] on top of the last full snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::Stream;
use tracing::{debug, info};

use crate::database::Persistence;
use crate::gateway::Gateway;
use crate::models::{
    CaptureMode, GroupId, MaterializedSnapshot, Roster, RosterPatch, RosterSummary, Snapshot,
    SnapshotContent, SnapshotMeta,
};
use crate::services::clock::{Clock, SystemClock};
use crate::utils::errors::{Result, ValhallaError};
use crate::utils::logging::log_snapshot_captured;

const HISTORY_PAGE_SIZE: usize = 50;

/// Apply patches in order on top of a full roster
pub fn fold<'a, I>(base: Roster, patches: I) -> Roster
where
    I: IntoIterator<Item = &'a RosterPatch>,
{
    patches.into_iter().fold(base, |mut roster, patch| {
        for id in &patch.removals {
            roster.remove(*id);
        }
        for record in &patch.upserts {
            roster.upsert(record.clone());
        }
        roster
    })
}

/// A materialized view plus the number of incrementals since its base
struct Resolved {
    meta: SnapshotMeta,
    roster: Roster,
    chain_length: u32,
}

#[derive(Clone)]
pub struct SnapshotStore {
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    max_incremental_chain: u32,
    sequence_locks: Arc<Mutex<HashMap<GroupId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SnapshotStore {
    pub fn new(persistence: Arc<dyn Persistence>, max_incremental_chain: u32) -> Self {
        Self {
            persistence,
            clock: Arc::new(SystemClock),
            max_incremental_chain,
            sequence_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch the live roster and append it as the group's next snapshot
    pub async fn capture(&self, gateway: &dyn Gateway, group_id: GroupId, mode: CaptureMode) -> Result<Snapshot> {
        let roster = gateway.fetch_roster(group_id).await?;

        let lock = self.sequence_lock(group_id);
        let _guard = lock.lock().await;

        let previous = match self.persistence.latest_sequence(group_id).await? {
            Some(sequence) => Some(self.resolve(group_id, sequence).await?),
            None => None,
        };

        let mode = match (&previous, mode) {
            (None, CaptureMode::Incremental) => {
                info!(group_id = %group_id, "No previous snapshot, capturing full instead of incremental");
                CaptureMode::Full
            }
            (Some(prev), CaptureMode::Incremental) if prev.chain_length >= self.max_incremental_chain => {
                info!(
                    group_id = %group_id,
                    chain_length = prev.chain_length,
                    "Incremental chain limit reached, capturing full"
                );
                CaptureMode::Full
            }
            (_, mode) => mode,
        };

        let empty = Roster::new();
        let previous_roster = previous.as_ref().map(|p| &p.roster).unwrap_or(&empty);
        let patch = RosterPatch::between(previous_roster, &roster);
        let joined_count = patch.upserts.iter().filter(|r| !previous_roster.contains(r.id)).count();
        let summary = RosterSummary::of(&roster, joined_count, patch.removals.len());

        let meta = SnapshotMeta {
            group_id,
            sequence: previous.as_ref().map(|p| p.meta.sequence + 1).unwrap_or(1),
            mode,
            captured_at: self.clock.now(),
            summary,
        };
        let content = match mode {
            CaptureMode::Full => SnapshotContent::Full(roster),
            CaptureMode::Incremental => SnapshotContent::Incremental(patch),
        };
        let snapshot = Snapshot { meta, content };

        self.persistence.save_snapshot(&snapshot).await?;
        log_snapshot_captured(&snapshot.meta);

        Ok(snapshot)
    }

    /// Complete roster as of `sequence`
    pub async fn materialize(&self, group_id: GroupId, sequence: u64) -> Result<MaterializedSnapshot> {
        let resolved = self.resolve(group_id, sequence).await?;
        Ok(MaterializedSnapshot {
            meta: resolved.meta,
            roster: resolved.roster,
        })
    }

    /// Newest snapshot of the group, materialized
    pub async fn latest(&self, group_id: GroupId) -> Result<Option<MaterializedSnapshot>> {
        match self.persistence.latest_sequence(group_id).await? {
            Some(sequence) => Ok(Some(self.materialize(group_id, sequence).await?)),
            None => Ok(None),
        }
    }

    /// Snapshot metadata, newest first, fetched page by page as the stream
    /// is polled. Each call starts again from the newest snapshot.
    pub fn history(&self, group_id: GroupId) -> impl Stream<Item = Result<SnapshotMeta>> + Send + 'static {
        let persistence = self.persistence.clone();
        async_stream::try_stream! {
            let mut before = None;
            loop {
                let page = persistence
                    .list_snapshots(group_id, before, HISTORY_PAGE_SIZE)
                    .await
                    .map_err(ValhallaError::from)?;
                let exhausted = page.len() < HISTORY_PAGE_SIZE;
                before = page.last().map(|meta| meta.sequence);
                for meta in page {
                    yield meta;
                }
                if exhausted || before.is_none() {
                    break;
                }
            }
        }
    }

    async fn resolve(&self, group_id: GroupId, sequence: u64) -> Result<Resolved> {
        let Snapshot { meta, content } = self
            .persistence
            .load_snapshot(group_id, sequence)
            .await?
            .ok_or(ValhallaError::SnapshotNotFound { group_id, sequence })?;

        let mut patches = Vec::new();
        let mut current = content;
        let mut cursor = sequence;
        let base = loop {
            match current {
                SnapshotContent::Full(roster) => break roster,
                SnapshotContent::Incremental(patch) => {
                    patches.push(patch);
                    cursor = cursor.checked_sub(1).filter(|s| *s > 0).ok_or(ValhallaError::Corruption {
                        group_id,
                        requested: sequence,
                        missing: 0,
                    })?;
                    let link = self
                        .persistence
                        .load_snapshot(group_id, cursor)
                        .await?
                        .ok_or(ValhallaError::Corruption { group_id, requested: sequence, missing: cursor })?;
                    current = link.content;
                }
            }
        };

        let chain_length = patches.len() as u32;
        debug!(group_id = %group_id, sequence = sequence, base = cursor, chain_length = chain_length, "Replaying snapshot chain");

        Ok(Resolved {
            meta,
            roster: fold(base, patches.iter().rev()),
            chain_length,
        })
    }

    fn sequence_lock(&self, group_id: GroupId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.sequence_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(group_id).or_default().clone()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("max_incremental_chain", &self.max_incremental_chain)
            .finish()
    }
}

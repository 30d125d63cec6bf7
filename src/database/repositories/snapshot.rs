//! Snapshot repository implementation

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::models::{CaptureMode, GroupId, RosterSummary, Snapshot, SnapshotContent, SnapshotMeta};
use crate::utils::errors::{StorageError, StorageResult};

#[derive(Debug, FromRow)]
struct SnapshotMetaRow {
    group_id: i64,
    sequence: i64,
    capture_mode: String,
    captured_at: DateTime<Utc>,
    summary: Json<RosterSummary>,
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    #[sqlx(flatten)]
    meta: SnapshotMetaRow,
    content: Json<SnapshotContent>,
}

impl TryFrom<SnapshotMetaRow> for SnapshotMeta {
    type Error = StorageError;

    fn try_from(row: SnapshotMetaRow) -> StorageResult<Self> {
        let mode = CaptureMode::parse(&row.capture_mode).ok_or_else(|| {
            StorageError::Unavailable(format!("unknown capture mode '{}'", row.capture_mode))
        })?;
        Ok(SnapshotMeta {
            group_id: GroupId(row.group_id),
            sequence: row.sequence as u64,
            mode,
            captured_at: row.captured_at,
            summary: row.summary.0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: PgPool,
}

impl SnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a snapshot; a taken (group, sequence) pair is a conflict
    pub async fn insert(&self, snapshot: &Snapshot) -> StorageResult<()> {
        let meta = &snapshot.meta;
        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (group_id, sequence, capture_mode, captured_at, summary, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        )
        .bind(meta.group_id.0)
        .bind(meta.sequence as i64)
        .bind(meta.mode.as_str())
        .bind(meta.captured_at)
        .bind(Json(&meta.summary))
        .bind(Json(&snapshot.content))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StorageError::Conflict {
                group_id: meta.group_id,
                sequence: meta.sequence,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Find snapshot by group and sequence
    pub async fn find(&self, group_id: GroupId, sequence: u64) -> StorageResult<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT group_id, sequence, capture_mode, captured_at, summary, content FROM snapshots WHERE group_id = $1 AND sequence = $2"
        )
        .bind(group_id.0)
        .bind(sequence as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Snapshot {
                meta: row.meta.try_into()?,
                content: row.content.0,
            })
        })
        .transpose()
    }

    pub async fn latest_sequence(&self, group_id: GroupId) -> StorageResult<Option<u64>> {
        let latest: (Option<i64>,) = sqlx::query_as("SELECT MAX(sequence) FROM snapshots WHERE group_id = $1")
            .bind(group_id.0)
            .fetch_one(&self.pool)
            .await?;

        Ok(latest.0.map(|s| s as u64))
    }

    /// List metadata newest first, below an optional sequence cursor
    pub async fn list(&self, group_id: GroupId, before: Option<u64>, limit: usize) -> StorageResult<Vec<SnapshotMeta>> {
        let rows = sqlx::query_as::<_, SnapshotMetaRow>(
            r#"
            SELECT group_id, sequence, capture_mode, captured_at, summary
            FROM snapshots
            WHERE group_id = $1 AND ($2::BIGINT IS NULL OR sequence < $2)
            ORDER BY sequence DESC
            LIMIT $3
            "#
        )
        .bind(group_id.0)
        .bind(before.map(|s| s as i64))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SnapshotMeta::try_from).collect()
    }
}

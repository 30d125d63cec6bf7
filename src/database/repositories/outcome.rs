//! Action outcome repository implementation

use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::{ActionOutcome, GroupId, RunId};
use crate::utils::errors::StorageResult;

#[derive(Debug, Clone)]
pub struct OutcomeRepository {
    pool: PgPool,
}

impl OutcomeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record the outcome at `position` of a run's plan
    pub async fn upsert(&self, run_id: RunId, group_id: GroupId, position: usize, outcome: &ActionOutcome) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO action_outcomes (run_id, position, group_id, member_id, action_kind, status, outcome, applied_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (run_id, position) DO UPDATE
            SET status = EXCLUDED.status,
                outcome = EXCLUDED.outcome,
                applied_at = EXCLUDED.applied_at,
                recorded_at = NOW()
            "#
        )
        .bind(run_id.0)
        .bind(position as i32)
        .bind(group_id.0)
        .bind(outcome.action.target.0)
        .bind(outcome.action.kind.as_str())
        .bind(outcome.status.label())
        .bind(Json(outcome))
        .bind(outcome.applied_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Outcomes of a run in plan order
    pub async fn find_by_run(&self, run_id: RunId) -> StorageResult<Vec<ActionOutcome>> {
        let rows: Vec<(Json<ActionOutcome>,)> = sqlx::query_as(
            "SELECT outcome FROM action_outcomes WHERE run_id = $1 ORDER BY position ASC"
        )
        .bind(run_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(outcome,)| outcome.0).collect())
    }
}

//! Restore service
//!
//! Entry points used by callers: deltas between snapshots or against the
//! live group, plan building (dry run or not), plan execution and snapshot
//! history. Only execution mutates the remote group.

use std::sync::Arc;

use futures::Stream;
use tracing::info;

use crate::config::Settings;
use crate::database::Persistence;
use crate::gateway::Gateway;
use crate::models::{
    ActionOutcome, CaptureMode, Delta, GroupId, LiveRoster, MaterializedSnapshot, PlanOptions,
    RestorePlan, RunId, RunReport, Snapshot, SnapshotMeta,
};
use crate::services::clock::Clock;
use crate::services::diff::diff;
use crate::services::executor::Executor;
use crate::services::planner::plan;
use crate::services::snapshot_store::SnapshotStore;
use crate::state::run_registry::RunProgress;
use crate::utils::errors::{Result, ValhallaError};

/// What to restore, from where, into which group
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub source_group: GroupId,
    /// Snapshot sequence; the newest snapshot when `None`
    pub sequence: Option<u64>,
    pub target_group: GroupId,
    pub options: PlanOptions,
    /// Build the plan without executing it
    pub dry_run: bool,
}

impl RestoreRequest {
    pub fn new(group_id: GroupId) -> Self {
        Self {
            source_group: group_id,
            sequence: None,
            target_group: group_id,
            options: PlanOptions::default(),
            dry_run: false,
        }
    }

    pub fn at_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn into_group(mut self, target_group: GroupId) -> Self {
        self.target_group = target_group;
        self
    }

    pub fn with_options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Plan of a restore and, unless it was a dry run, its run report
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub plan: RestorePlan,
    pub report: Option<RunReport>,
}

#[derive(Clone)]
pub struct RestoreService {
    persistence: Arc<dyn Persistence>,
    store: SnapshotStore,
    executor: Executor,
    plan_defaults: PlanOptions,
}

impl RestoreService {
    pub fn new(persistence: Arc<dyn Persistence>, store: SnapshotStore, executor: Executor) -> Self {
        Self {
            persistence,
            store,
            executor,
            plan_defaults: PlanOptions::default(),
        }
    }

    pub fn from_settings(persistence: Arc<dyn Persistence>, settings: &Settings, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = SnapshotStore::new(persistence.clone(), settings.backup.max_incremental_chain).with_clock(clock.clone());
        let executor = Executor::from_settings(persistence.clone(), &settings.restore)?.with_clock(clock);
        Ok(Self::new(persistence, store, executor).with_plan_defaults(settings.restore.plan_options()))
    }

    /// Options given to requests made through [`RestoreService::request`]
    pub fn with_plan_defaults(mut self, options: PlanOptions) -> Self {
        self.plan_defaults = options;
        self
    }

    pub fn plan_defaults(&self) -> &PlanOptions {
        &self.plan_defaults
    }

    /// Restore request for a group carrying the configured plan options
    pub fn request(&self, group_id: GroupId) -> RestoreRequest {
        RestoreRequest::new(group_id).with_options(self.plan_defaults.clone())
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub async fn capture(&self, gateway: &dyn Gateway, group_id: GroupId, mode: CaptureMode) -> Result<Snapshot> {
        self.store.capture(gateway, group_id, mode).await
    }

    /// Changes between two snapshots of a group, `from` as the source
    pub async fn build_delta(&self, group_id: GroupId, from: u64, to: u64) -> Result<Delta> {
        let source = self.store.materialize(group_id, from).await?;
        let target = self.store.materialize(group_id, to).await?;
        Ok(diff(&source.roster, &target.roster))
    }

    /// Changes from a snapshot to the group's live roster
    pub async fn build_live_delta(&self, gateway: &dyn Gateway, group_id: GroupId, sequence: Option<u64>) -> Result<Delta> {
        let snapshot = self.resolve_snapshot(group_id, sequence).await?;
        let live = gateway.fetch_roster(group_id).await?;
        Ok(diff(&snapshot.roster, &live))
    }

    /// Plan converging the target group toward the requested snapshot.
    /// Reads the live roster but never mutates anything. The acting account
    /// is always excluded.
    pub async fn build_plan(&self, gateway: &dyn Gateway, request: &RestoreRequest) -> Result<RestorePlan> {
        let desired = self.resolve_snapshot(request.source_group, request.sequence).await?;
        let live = LiveRoster {
            group_id: request.target_group,
            roster: gateway.fetch_roster(request.target_group).await?,
            fetched_at: chrono::Utc::now(),
        };

        let mut options = request.options.clone();
        options.exclude.insert(gateway.self_id().await?);

        let restore_plan = plan(&desired, &live, &options);
        let summary = restore_plan.summary();
        info!(
            source_group = %summary.source_group,
            sequence = summary.source_sequence,
            target_group = %summary.target_group,
            actions = summary.total_actions,
            unreachable = summary.unreachable,
            rejected = summary.rejected,
            dry_run = request.dry_run,
            "Restore plan ready"
        );
        Ok(restore_plan)
    }

    pub async fn execute_plan(&self, gateway: &dyn Gateway, plan: &RestorePlan) -> Result<RunReport> {
        self.executor.execute(gateway, plan).await
    }

    /// Build the plan and execute it unless the request is a dry run
    pub async fn restore(&self, gateway: &dyn Gateway, request: &RestoreRequest) -> Result<RestoreOutcome> {
        let plan = self.build_plan(gateway, request).await?;
        let report = if request.dry_run {
            None
        } else {
            Some(self.execute_plan(gateway, &plan).await?)
        };
        Ok(RestoreOutcome { plan, report })
    }

    pub fn cancel(&self, group_id: GroupId) -> bool {
        self.executor.cancel(group_id)
    }

    /// Hold the group's active run; actions already in flight finish
    pub fn pause(&self, group_id: GroupId) -> bool {
        self.executor.pause(group_id)
    }

    pub fn resume(&self, group_id: GroupId) -> bool {
        self.executor.resume(group_id)
    }

    /// Live progress of the group's active run, `None` when idle
    pub fn progress(&self, group_id: GroupId) -> Option<RunProgress> {
        self.executor.progress(group_id)
    }

    pub fn snapshot_history(&self, group_id: GroupId) -> impl Stream<Item = Result<SnapshotMeta>> + Send + 'static {
        self.store.history(group_id)
    }

    /// Recorded outcomes of a past run
    pub async fn run_outcomes(&self, run_id: RunId) -> Result<Vec<ActionOutcome>> {
        Ok(self.persistence.load_outcomes(run_id).await?)
    }

    async fn resolve_snapshot(&self, group_id: GroupId, sequence: Option<u64>) -> Result<MaterializedSnapshot> {
        match sequence {
            Some(sequence) => self.store.materialize(group_id, sequence).await,
            None => self.store.latest(group_id).await?.ok_or(ValhallaError::NoSnapshots { group_id }),
        }
    }
}

impl std::fmt::Debug for RestoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreService")
            .field("store", &self.store)
            .field("executor", &self.executor)
            .field("plan_defaults", &self.plan_defaults)
            .finish()
    }
}

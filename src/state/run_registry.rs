//! Per-group run registry
//!
//! Serializes restore runs per group and carries the cooperative
//! cancellation flag, pause gate and live progress of each active run.
//! Runs against different groups never contend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::models::{GroupId, OutcomeStatus, RunId, RunSummary, SkipReason};
use crate::utils::errors::{Result, ValhallaError};

/// Cooperative cancellation flag checked between actions
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pause switch checked before each action starts
#[derive(Debug, Clone)]
pub struct PauseGate(Arc<watch::Sender<bool>>);

impl Default for PauseGate {
    fn default() -> Self {
        Self(Arc::new(watch::channel(false).0))
    }
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        self.0.send_replace(true);
    }

    pub fn resume(&self) {
        self.0.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.0.borrow()
    }

    /// Suspend until the gate is open
    pub async fn wait_open(&self) {
        let mut open = self.0.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = open.wait_for(|paused| !*paused).await;
    }
}

/// Snapshot of an active run's progress
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    pub run_id: RunId,
    pub group_id: GroupId,
    pub total: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Skipped because the run was cancelled; included in `skipped`
    pub cancelled: usize,
    pub paused: bool,
}

impl RunProgress {
    fn new(run_id: RunId, group_id: GroupId, total: usize) -> Self {
        Self {
            run_id,
            group_id,
            total,
            applied: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            paused: false,
        }
    }

    fn record(&mut self, status: &OutcomeStatus) {
        match status {
            OutcomeStatus::Applied => self.applied += 1,
            OutcomeStatus::Skipped { reason } => {
                self.skipped += 1;
                if *reason == SkipReason::Cancelled {
                    self.cancelled += 1;
                }
            }
            OutcomeStatus::Failed { .. } => self.failed += 1,
        }
    }

    /// Same shape as the final report's summary
    pub fn summary(&self) -> RunSummary {
        let processed = self.applied + self.skipped + self.failed - self.cancelled;
        let progress_percent = if self.total == 0 {
            100.0
        } else {
            (processed as f64 / self.total as f64) * 100.0
        };
        RunSummary {
            total: self.total,
            applied: self.applied,
            skipped: self.skipped,
            failed: self.failed,
            progress_percent,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: RunId,
    cancel: CancelFlag,
    pause: PauseGate,
    progress: Arc<Mutex<RunProgress>>,
}

/// Registry of runs currently executing, keyed by group
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashMap<GroupId, ActiveRun>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the group's execution lock for a run of `total` actions. A
    /// second run on a busy group is rejected, not queued.
    pub fn try_begin(&self, group_id: GroupId, run_id: RunId, total: usize) -> Result<RunGuard> {
        let mut active = self.lock();
        if let Some(existing) = active.get(&group_id) {
            warn!(group_id = %group_id, running = %existing.run_id, rejected = %run_id, "Restore run rejected, group busy");
            return Err(ValhallaError::RunInProgress { group_id });
        }

        let run = ActiveRun {
            run_id,
            cancel: CancelFlag::new(),
            pause: PauseGate::new(),
            progress: Arc::new(Mutex::new(RunProgress::new(run_id, group_id, total))),
        };
        active.insert(group_id, run.clone());
        info!(group_id = %group_id, run_id = %run_id, "Restore run started");

        Ok(RunGuard {
            registry: self.clone(),
            group_id,
            run,
        })
    }

    /// Request cancellation of the group's active run. A paused run is
    /// released so its remaining actions can be skipped.
    pub fn cancel(&self, group_id: GroupId) -> bool {
        match self.lock().get(&group_id) {
            Some(run) => {
                run.cancel.cancel();
                run.pause.resume();
                info!(group_id = %group_id, run_id = %run.run_id, "Restore run cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Hold the group's active run before its next action; in-flight
    /// actions still finish
    pub fn pause(&self, group_id: GroupId) -> bool {
        match self.lock().get(&group_id) {
            Some(run) if !run.cancel.is_cancelled() => {
                run.pause.pause();
                info!(group_id = %group_id, run_id = %run.run_id, "Restore run paused");
                true
            }
            _ => false,
        }
    }

    pub fn resume(&self, group_id: GroupId) -> bool {
        match self.lock().get(&group_id) {
            Some(run) => {
                run.pause.resume();
                info!(group_id = %group_id, run_id = %run.run_id, "Restore run resumed");
                true
            }
            None => false,
        }
    }

    /// Live progress of the group's active run
    pub fn progress(&self, group_id: GroupId) -> Option<RunProgress> {
        self.lock().get(&group_id).map(|run| {
            let mut progress = lock_progress(&run.progress).clone();
            progress.paused = run.pause.is_paused();
            progress
        })
    }

    pub fn is_running(&self, group_id: GroupId) -> bool {
        self.lock().contains_key(&group_id)
    }

    pub fn active_runs(&self) -> Vec<(GroupId, RunId)> {
        let mut runs: Vec<_> = self.lock().iter().map(|(group, run)| (*group, run.run_id)).collect();
        runs.sort_by_key(|(group, _)| *group);
        runs
    }

    fn release(&self, group_id: GroupId, run_id: RunId) {
        let mut active = self.lock();
        if active.get(&group_id).map(|run| run.run_id) == Some(run_id) {
            active.remove(&group_id);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GroupId, ActiveRun>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock_progress(progress: &Mutex<RunProgress>) -> MutexGuard<'_, RunProgress> {
    progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held for the duration of a run; releases the group on drop
#[derive(Debug)]
pub struct RunGuard {
    registry: RunRegistry,
    group_id: GroupId,
    run: ActiveRun,
}

impl RunGuard {
    pub fn run_id(&self) -> RunId {
        self.run.run_id
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.run.cancel
    }

    pub fn pause_gate(&self) -> &PauseGate {
        &self.run.pause
    }

    /// Count a terminal outcome towards the live progress
    pub fn record(&self, status: &OutcomeStatus) {
        lock_progress(&self.run.progress).record(status);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.release(self.group_id, self.run.run_id);
    }
}

//! Rate-limited plan executor
//!
//! Applies a [`RestorePlan`] to the target group through a [`Gateway`].
//! Tiers run strictly one after another; actions inside a tier share a
//! bounded worker pool and the token bucket. Each action re-reads the live
//! member right before mutating it, so re-running a plan only touches what
//! still differs.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rand::Rng;
use tracing::{debug, error, info};

use crate::config::{RestoreConfig, RetryConfig};
use crate::database::Persistence;
use crate::gateway::Gateway;
use crate::middleware::rate_limit::{ActionThrottle, RateLimitConfig, ThrottleStatistics};
use crate::models::{
    Action, ActionKind, ActionOutcome, GroupId, OutcomeStatus, RestorePlan, Role, RunId, RunReport,
    RunStatus, SkipReason, StorageFailure,
};
use crate::services::clock::{Clock, SystemClock};
use crate::state::run_registry::{RunGuard, RunProgress, RunRegistry};
use crate::utils::errors::{FailureKind, GatewayError, GatewayResult, Result};
use crate::utils::logging::{log_action_outcome, log_run_summary};

/// Retry schedule for transient gateway failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Randomize each wait within [backoff / 2, backoff]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        // clamp in f64; Duration::from_secs_f64 panics past Duration::MAX
        let capped = if scaled.is_finite() && scaled < self.max_backoff.as_secs_f64() {
            Duration::from_secs_f64(scaled.max(0.0))
        } else {
            self.max_backoff
        };

        if self.jitter && !capped.is_zero() {
            let low = capped / 2;
            rand::thread_rng().gen_range(low..=capped)
        } else {
            capped
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }
}

/// Life of a single action inside a run
#[derive(Debug)]
enum ActionState {
    Pending,
    InFlight { attempt: u32 },
    RetryWait { attempt: u32, error: GatewayError },
    Terminal(OutcomeStatus),
}

/// Result of one successful round trip for an action
enum Attempt {
    Applied,
    AlreadySatisfied,
    OwnerImmutable,
}

#[derive(Clone)]
pub struct Executor {
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    throttle: ActionThrottle,
    retry: RetryPolicy,
    workers: usize,
    registry: RunRegistry,
}

impl Executor {
    pub fn new(persistence: Arc<dyn Persistence>, rate_limit: RateLimitConfig, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            persistence,
            clock: Arc::new(SystemClock),
            throttle: ActionThrottle::new(rate_limit)?,
            retry,
            workers: 1,
            registry: RunRegistry::new(),
        })
    }

    pub fn from_settings(persistence: Arc<dyn Persistence>, config: &RestoreConfig) -> Result<Self> {
        Ok(Self::new(persistence, (&config.rate_limit).into(), (&config.retry).into())?.with_workers(config.workers))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn throttle_statistics(&self) -> ThrottleStatistics {
        self.throttle.statistics()
    }

    /// Request cancellation of the group's active run
    pub fn cancel(&self, group_id: GroupId) -> bool {
        self.registry.cancel(group_id)
    }

    /// Hold the group's active run before its next action
    pub fn pause(&self, group_id: GroupId) -> bool {
        self.registry.pause(group_id)
    }

    pub fn resume(&self, group_id: GroupId) -> bool {
        self.registry.resume(group_id)
    }

    pub fn progress(&self, group_id: GroupId) -> Option<RunProgress> {
        self.registry.progress(group_id)
    }

    /// Apply every action of the plan to its target group.
    ///
    /// Fails only when the group already has a run in progress. Per-action
    /// failures are recorded in the report and never stop the run.
    pub async fn execute(&self, gateway: &dyn Gateway, plan: &RestorePlan) -> Result<RunReport> {
        let run_id = RunId::new();
        let group_id = plan.target_group();
        let guard = self.registry.try_begin(group_id, run_id, plan.actions().len())?;
        let started_at = self.clock.now();

        info!(
            run_id = %run_id,
            group_id = %group_id,
            source_group = %plan.source_group(),
            sequence = plan.source_sequence(),
            actions = plan.actions().len(),
            "Restore run started"
        );

        let mut outcomes = Vec::with_capacity(plan.actions().len());
        let mut storage_failures = Vec::new();

        for tier in tiers(plan.actions()) {
            let mut results = stream::iter(tier)
                .map(|action| self.dispatch(gateway, group_id, action, &guard))
                .buffered(self.workers);

            while let Some(outcome) = results.next().await {
                let position = outcomes.len();
                log_action_outcome(run_id, group_id, position, &outcome);
                if let Err(e) = self.persistence.save_outcome(run_id, group_id, position, &outcome).await {
                    error!(run_id = %run_id, position = position, error = %e, "Failed to persist action outcome");
                    storage_failures.push(StorageFailure { position, message: e.to_string() });
                }
                guard.record(&outcome.status);
                outcomes.push(outcome);
            }
        }

        // a cancel that arrives after the last action started changes nothing
        let cancelled = outcomes
            .iter()
            .any(|o| o.status == OutcomeStatus::Skipped { reason: SkipReason::Cancelled });
        let status = if cancelled { RunStatus::Cancelled } else { RunStatus::Completed };
        let report = RunReport {
            run_id,
            group_id,
            status,
            outcomes,
            unreachable: plan.unreachable().to_vec(),
            rejected: plan.rejected().to_vec(),
            storage_failures,
            started_at,
            completed_at: self.clock.now(),
        };
        log_run_summary(&report);

        drop(guard);
        Ok(report)
    }

    /// Pause and cancellation checkpoint, then the action's state machine
    async fn dispatch(&self, gateway: &dyn Gateway, group_id: GroupId, action: &Action, guard: &RunGuard) -> ActionOutcome {
        guard.pause_gate().wait_open().await;
        if guard.cancel_flag().is_cancelled() {
            return ActionOutcome {
                action: action.clone(),
                status: OutcomeStatus::Skipped { reason: SkipReason::Cancelled },
                applied_at: None,
            };
        }

        let status = self.drive(gateway, group_id, action).await;
        let applied_at = matches!(status, OutcomeStatus::Applied).then(|| self.clock.now());
        ActionOutcome { action: action.clone(), status, applied_at }
    }

    async fn drive(&self, gateway: &dyn Gateway, group_id: GroupId, action: &Action) -> OutcomeStatus {
        let mut state = ActionState::Pending;
        loop {
            state = match state {
                ActionState::Pending => ActionState::InFlight { attempt: 1 },
                ActionState::InFlight { attempt } => match self.attempt(gateway, group_id, action).await {
                    Ok(Attempt::Applied) => ActionState::Terminal(OutcomeStatus::Applied),
                    Ok(Attempt::AlreadySatisfied) => ActionState::Terminal(OutcomeStatus::Skipped {
                        reason: SkipReason::AlreadySatisfied,
                    }),
                    Ok(Attempt::OwnerImmutable) => ActionState::Terminal(OutcomeStatus::Failed {
                        kind: FailureKind::OwnerImmutable,
                        attempts: attempt,
                        message: format!("member {} is the group owner", action.target),
                    }),
                    Err(error) if error.is_transient() && attempt < self.retry.max_attempts => {
                        ActionState::RetryWait { attempt, error }
                    }
                    Err(error) => ActionState::Terminal(OutcomeStatus::Failed {
                        kind: error.kind(),
                        attempts: attempt,
                        message: error.to_string(),
                    }),
                },
                ActionState::RetryWait { attempt, error } => {
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        member_id = %action.target,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying action after transient failure"
                    );
                    self.clock.sleep(delay).await;
                    ActionState::InFlight { attempt: attempt + 1 }
                }
                ActionState::Terminal(status) => return status,
            };
        }
    }

    /// Re-read the member, then mutate only if the live value still differs
    async fn attempt(&self, gateway: &dyn Gateway, group_id: GroupId, action: &Action) -> GatewayResult<Attempt> {
        let member_id = action.target;
        let live = gateway
            .fetch_member(group_id, member_id)
            .await?
            .ok_or(GatewayError::NotMember { group_id, member_id })?;

        let satisfied = match action.kind {
            ActionKind::SetCard => action.desired_text() == Some(live.card.as_str()),
            ActionKind::SetTitle => action.desired_text() == Some(live.title.as_str()),
            ActionKind::SetAdmin => {
                if live.role == Role::Owner {
                    return Ok(Attempt::OwnerImmutable);
                }
                action.desired_flag() == Some(live.role == Role::Admin)
            }
        };
        if satisfied {
            return Ok(Attempt::AlreadySatisfied);
        }

        self.throttle.acquire().await;
        match (action.kind, action.desired_text(), action.desired_flag()) {
            (ActionKind::SetCard, Some(card), _) => gateway.set_card(group_id, member_id, card).await,
            (ActionKind::SetTitle, Some(title), _) => gateway.set_title(group_id, member_id, title).await,
            (ActionKind::SetAdmin, _, Some(enable)) => gateway.set_admin(group_id, member_id, enable).await,
            _ => Err(GatewayError::InvalidValue(format!("malformed action {}", action))),
        }
        .map(|_| Attempt::Applied)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("throttle", &self.throttle)
            .field("retry", &self.retry)
            .field("workers", &self.workers)
            .finish()
    }
}

/// Split plan-ordered actions into consecutive runs of the same tier
fn tiers(actions: &[Action]) -> Vec<&[Action]> {
    let mut tiers = Vec::new();
    let mut start = 0;
    for i in 1..=actions.len() {
        if i == actions.len() || actions[i].tier() != actions[start].tier() {
            tiers.push(&actions[start..i]);
            start = i;
        }
    }
    tiers
}

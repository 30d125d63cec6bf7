//! In-memory group API for testing
//!
//! Keeps one roster per group, applies mutations to it and records every
//! mutation call. Failures can be scripted per member and action kind.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use Valhalla::gateway::Gateway;
use Valhalla::models::{ActionKind, GroupId, MemberId, MemberRecord, Role, Roster};
use Valhalla::utils::errors::{GatewayError, GatewayResult};

/// One mutation call received by the fake
#[derive(Debug, Clone)]
pub struct MutationCall {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub kind: ActionKind,
    pub enable: Option<bool>,
    pub at: Instant,
}

#[derive(Default)]
struct FakeState {
    groups: HashMap<GroupId, Roster>,
    next_failures: HashMap<(MemberId, ActionKind), VecDeque<GatewayError>>,
    sticky_failures: HashMap<(MemberId, ActionKind), GatewayError>,
    roster_failure: Option<GatewayError>,
    read_failures: HashMap<MemberId, VecDeque<GatewayError>>,
    mutations: Vec<MutationCall>,
    member_reads: usize,
    mutation_delay: Option<Duration>,
}

#[derive(Clone)]
pub struct FakeGateway {
    self_id: MemberId,
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    pub fn new(self_id: MemberId) -> Self {
        Self {
            self_id,
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Replace the live roster of a group
    pub fn set_roster(&self, group_id: GroupId, records: Vec<MemberRecord>) {
        let roster = Roster::from_records(records).expect("test roster has duplicate members");
        self.lock().groups.insert(group_id, roster);
    }

    pub fn roster(&self, group_id: GroupId) -> Roster {
        self.lock().groups.get(&group_id).cloned().unwrap_or_default()
    }

    pub fn member(&self, group_id: GroupId, member_id: MemberId) -> Option<MemberRecord> {
        self.roster(group_id).get(member_id).cloned()
    }

    /// Fail the next call of `kind` on `member_id` with `error`; queued
    /// failures are consumed in order
    pub fn fail_next(&self, member_id: MemberId, kind: ActionKind, error: GatewayError) {
        self.lock().next_failures.entry((member_id, kind)).or_default().push_back(error);
    }

    /// Fail every call of `kind` on `member_id` with `error`
    pub fn fail_always(&self, member_id: MemberId, kind: ActionKind, error: GatewayError) {
        self.lock().sticky_failures.insert((member_id, kind), error);
    }

    /// Fail the next live read of `member_id` with `error`
    pub fn fail_next_read(&self, member_id: MemberId, error: GatewayError) {
        self.lock().read_failures.entry(member_id).or_default().push_back(error);
    }

    pub fn fail_roster_fetch(&self, error: GatewayError) {
        self.lock().roster_failure = Some(error);
    }

    /// Make each mutation take `delay` before it lands
    pub fn set_mutation_delay(&self, delay: Duration) {
        self.lock().mutation_delay = Some(delay);
    }

    pub fn mutations(&self) -> Vec<MutationCall> {
        self.lock().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().mutations.len()
    }

    pub fn member_reads(&self) -> usize {
        self.lock().member_reads
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn mutate<F>(&self, group_id: GroupId, member_id: MemberId, kind: ActionKind, enable: Option<bool>, apply: F) -> GatewayResult<()>
    where
        F: FnOnce(&mut MemberRecord) -> GatewayResult<()>,
    {
        let delay = {
            let mut state = self.lock();
            state.mutations.push(MutationCall { group_id, member_id, kind, enable, at: Instant::now() });
            state.mutation_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some(error) = state.next_failures.get_mut(&(member_id, kind)).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if let Some(error) = state.sticky_failures.get(&(member_id, kind)) {
            return Err(error.clone());
        }

        let roster = state.groups.entry(group_id).or_default();
        let mut record = roster
            .get(member_id)
            .cloned()
            .ok_or(GatewayError::NotMember { group_id, member_id })?;
        apply(&mut record)?;

        let records: Vec<MemberRecord> = roster
            .iter()
            .filter(|m| m.id != member_id)
            .cloned()
            .chain(std::iter::once(record))
            .collect();
        *roster = Roster::from_records(records).map_err(|e| GatewayError::Protocol(e.to_string()))?;
        Ok(())
    }

    fn read_failure(&self, member_id: MemberId) -> Option<GatewayError> {
        let mut state = self.lock();
        state.member_reads += 1;
        if let Some(error) = state.roster_failure.clone() {
            return Some(error);
        }
        state.read_failures.get_mut(&member_id).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn fetch_roster(&self, group_id: GroupId) -> GatewayResult<Roster> {
        let state = self.lock();
        if let Some(error) = &state.roster_failure {
            return Err(error.clone());
        }
        Ok(state.groups.get(&group_id).cloned().unwrap_or_default())
    }

    async fn fetch_member(&self, group_id: GroupId, member_id: MemberId) -> GatewayResult<Option<MemberRecord>> {
        if let Some(error) = self.read_failure(member_id) {
            return Err(error);
        }
        Ok(self.member(group_id, member_id))
    }

    async fn set_card(&self, group_id: GroupId, member_id: MemberId, card: &str) -> GatewayResult<()> {
        let card = card.to_string();
        self.mutate(group_id, member_id, ActionKind::SetCard, None, move |record| {
            record.card = card;
            Ok(())
        })
        .await
    }

    async fn set_title(&self, group_id: GroupId, member_id: MemberId, title: &str) -> GatewayResult<()> {
        let title = title.to_string();
        self.mutate(group_id, member_id, ActionKind::SetTitle, None, move |record| {
            record.title = title;
            Ok(())
        })
        .await
    }

    async fn set_admin(&self, group_id: GroupId, member_id: MemberId, enable: bool) -> GatewayResult<()> {
        self.mutate(group_id, member_id, ActionKind::SetAdmin, Some(enable), move |record| {
            if record.role == Role::Owner {
                return Err(GatewayError::RequiresOwner);
            }
            record.role = if enable { Role::Admin } else { Role::Member };
            Ok(())
        })
        .await
    }

    async fn self_id(&self) -> GatewayResult<MemberId> {
        Ok(self.self_id)
    }
}

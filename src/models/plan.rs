//! Restore plan models

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::member::{GroupId, MemberId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SetCard,
    SetTitle,
    SetAdmin,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SetCard => "set_card",
            ActionKind::SetTitle => "set_title",
            ActionKind::SetAdmin => "set_admin",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Flag(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(text) => write!(f, "'{}'", text),
            AttributeValue::Flag(flag) => write!(f, "{}", flag),
        }
    }
}

/// Ordering tier; a plan runs all revokes, then attributes, then grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTier {
    Revoke,
    Attribute,
    Grant,
}

/// One atomic remote mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub target: MemberId,
    pub kind: ActionKind,
    pub desired: AttributeValue,
    /// Live value observed when the plan was built
    pub current: AttributeValue,
}

impl Action {
    pub fn set_card(target: MemberId, desired: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            target,
            kind: ActionKind::SetCard,
            desired: AttributeValue::Text(desired.into()),
            current: AttributeValue::Text(current.into()),
        }
    }

    pub fn set_title(target: MemberId, desired: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            target,
            kind: ActionKind::SetTitle,
            desired: AttributeValue::Text(desired.into()),
            current: AttributeValue::Text(current.into()),
        }
    }

    pub fn set_admin(target: MemberId, enable: bool) -> Self {
        Self {
            target,
            kind: ActionKind::SetAdmin,
            desired: AttributeValue::Flag(enable),
            current: AttributeValue::Flag(!enable),
        }
    }

    pub fn tier(&self) -> ActionTier {
        match (self.kind, &self.desired) {
            (ActionKind::SetAdmin, AttributeValue::Flag(false)) => ActionTier::Revoke,
            (ActionKind::SetAdmin, _) => ActionTier::Grant,
            _ => ActionTier::Attribute,
        }
    }

    pub fn desired_text(&self) -> Option<&str> {
        match &self.desired {
            AttributeValue::Text(text) => Some(text.as_str()),
            AttributeValue::Flag(_) => None,
        }
    }

    pub fn desired_flag(&self) -> Option<bool> {
        match self.desired {
            AttributeValue::Flag(flag) => Some(flag),
            AttributeValue::Text(_) => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {} -> {})", self.kind, self.target, self.current, self.desired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Desired role is owner; ownership transfer is not a remote operation
    OwnershipTransfer,
    /// Live owner would have to be demoted
    OwnerDemotion,
}

/// Role difference the remote protocol cannot express
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedChange {
    pub member: MemberId,
    pub reason: RejectReason,
}

/// Which attribute families a restore converges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOptions {
    pub restore_card: bool,
    pub restore_title: bool,
    pub restore_admin: bool,
    /// Identities never touched, e.g. the acting account itself
    pub exclude: BTreeSet<MemberId>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            restore_card: true,
            restore_title: true,
            restore_admin: true,
            exclude: BTreeSet::new(),
        }
    }
}

/// Ordered, immutable sequence of actions converging a live group toward a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorePlan {
    source_group: GroupId,
    source_sequence: u64,
    target_group: GroupId,
    actions: Vec<Action>,
    unreachable: Vec<MemberId>,
    rejected: Vec<RejectedChange>,
    excluded: Vec<MemberId>,
}

impl RestorePlan {
    pub(crate) fn new(
        source_group: GroupId,
        source_sequence: u64,
        target_group: GroupId,
        actions: Vec<Action>,
        unreachable: Vec<MemberId>,
        rejected: Vec<RejectedChange>,
        excluded: Vec<MemberId>,
    ) -> Self {
        Self {
            source_group,
            source_sequence,
            target_group,
            actions,
            unreachable,
            rejected,
            excluded,
        }
    }

    pub fn source_group(&self) -> GroupId {
        self.source_group
    }

    pub fn source_sequence(&self) -> u64 {
        self.source_sequence
    }

    /// Live group the actions apply to
    pub fn target_group(&self) -> GroupId {
        self.target_group
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Snapshot members absent from the live group
    pub fn unreachable(&self) -> &[MemberId] {
        &self.unreachable
    }

    pub fn rejected(&self) -> &[RejectedChange] {
        &self.rejected
    }

    pub fn excluded(&self) -> &[MemberId] {
        &self.excluded
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn is_cross_group(&self) -> bool {
        self.source_group != self.target_group
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            source_group: self.source_group,
            source_sequence: self.source_sequence,
            target_group: self.target_group,
            is_cross_group: self.is_cross_group(),
            total_actions: self.actions.len(),
            card_changes: 0,
            title_changes: 0,
            admin_grants: 0,
            admin_revokes: 0,
            unreachable: self.unreachable.len(),
            rejected: self.rejected.len(),
            excluded: self.excluded.len(),
        };
        for action in &self.actions {
            match (action.kind, action.tier()) {
                (ActionKind::SetCard, _) => summary.card_changes += 1,
                (ActionKind::SetTitle, _) => summary.title_changes += 1,
                (ActionKind::SetAdmin, ActionTier::Revoke) => summary.admin_revokes += 1,
                (ActionKind::SetAdmin, _) => summary.admin_grants += 1,
            }
        }
        summary
    }
}

/// Dry-run preview counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub source_group: GroupId,
    pub source_sequence: u64,
    pub target_group: GroupId,
    pub is_cross_group: bool,
    pub total_actions: usize,
    pub card_changes: usize,
    pub title_changes: usize,
    pub admin_grants: usize,
    pub admin_revokes: usize,
    pub unreachable: usize,
    pub rejected: usize,
    pub excluded: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tiers() {
        assert_eq!(Action::set_admin(MemberId(1), false).tier(), ActionTier::Revoke);
        assert_eq!(Action::set_admin(MemberId(1), true).tier(), ActionTier::Grant);
        assert_eq!(Action::set_card(MemberId(1), "a", "b").tier(), ActionTier::Attribute);
        assert_eq!(Action::set_title(MemberId(1), "a", "b").tier(), ActionTier::Attribute);
        assert!(ActionTier::Revoke < ActionTier::Attribute && ActionTier::Attribute < ActionTier::Grant);
    }

    #[test]
    fn test_plan_summary() {
        let plan = RestorePlan::new(
            GroupId(1),
            3,
            GroupId(2),
            vec![
                Action::set_admin(MemberId(5), false),
                Action::set_card(MemberId(1), "a", ""),
                Action::set_title(MemberId(1), "t", ""),
                Action::set_admin(MemberId(1), true),
            ],
            vec![MemberId(9)],
            vec![],
            vec![],
        );
        let summary = plan.summary();
        assert!(summary.is_cross_group);
        assert_eq!(summary.total_actions, 4);
        assert_eq!(summary.card_changes, 1);
        assert_eq!(summary.title_changes, 1);
        assert_eq!(summary.admin_grants, 1);
        assert_eq!(summary.admin_revokes, 1);
        assert_eq!(summary.unreachable, 1);
    }

    #[test]
    fn test_action_display() {
        let action = Action::set_card(MemberId(1001), "Alice", "Alicia");
        assert_eq!(action.to_string(), "set_card(1001, 'Alicia' -> 'Alice')");
    }
}

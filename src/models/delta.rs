//! Structural difference between two rosters

use serde::{Deserialize, Serialize};

use super::member::{MemberId, MemberRecord, Role};

/// One attribute that differs between source and target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldChange {
    Card { from: String, to: String },
    Title { from: String, to: String },
    Role { from: Role, to: Role },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberChange {
    pub id: MemberId,
    pub changes: Vec<FieldChange>,
}

impl MemberChange {
    pub fn card(&self) -> Option<(&str, &str)> {
        self.changes.iter().find_map(|c| match c {
            FieldChange::Card { from, to } => Some((from.as_str(), to.as_str())),
            _ => None,
        })
    }

    pub fn title(&self) -> Option<(&str, &str)> {
        self.changes.iter().find_map(|c| match c {
            FieldChange::Title { from, to } => Some((from.as_str(), to.as_str())),
            _ => None,
        })
    }

    pub fn role(&self) -> Option<(Role, Role)> {
        self.changes.iter().find_map(|c| match c {
            FieldChange::Role { from, to } => Some((*from, *to)),
            _ => None,
        })
    }
}

/// Joined / left / changed decomposition, each ordered by identity.
///
/// `joined` holds the target side's records, `left` the source side's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub joined: Vec<MemberRecord>,
    pub left: Vec<MemberRecord>,
    pub changed: Vec<MemberChange>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty() && self.changed.is_empty()
    }

    pub fn joined_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.joined.iter().map(|m| m.id)
    }

    pub fn left_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.left.iter().map(|m| m.id)
    }

    pub fn changed_ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.changed.iter().map(|c| c.id)
    }
}

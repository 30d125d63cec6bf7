//! Member and roster models

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::errors::{Result, ValhallaError};

/// Remote group number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub i64);

/// Account id, unique within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    #[default]
    Member,
}

impl Role {
    /// Owner and admin both hold elevated privilege
    pub fn is_elevated(&self) -> bool {
        !matches!(self, Role::Member)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Lenient parse used at the gateway boundary; unknown roles are plain members
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Role::Owner,
            "admin" => Role::Admin,
            _ => Role::Member,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member of a group at a point in time.
///
/// An empty `card` or `title` means the attribute is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: MemberId,
    pub display_name: String,
    pub card: String,
    pub title: String,
    pub role: Role,
    pub joined_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub level: Option<u32>,
}

impl MemberRecord {
    pub fn new(id: MemberId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            card: String::new(),
            title: String::new(),
            role: Role::Member,
            joined_at: None,
            last_active_at: None,
            level: None,
        }
    }

    pub fn with_card(mut self, card: impl Into<String>) -> Self {
        self.card = card.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Name shown in reports: the card if set, otherwise the account name
    pub fn label(&self) -> &str {
        if self.card.is_empty() {
            &self.display_name
        } else {
            &self.card
        }
    }
}

/// Identity-unique set of member records, ordered by identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MemberRecord>", into = "Vec<MemberRecord>")]
pub struct Roster {
    members: BTreeMap<MemberId, MemberRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster, rejecting duplicate identities
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = MemberRecord>,
    {
        let mut members = BTreeMap::new();
        for record in records {
            let id = record.id;
            if members.insert(id, record).is_some() {
                return Err(ValhallaError::DuplicateMember { member_id: id });
            }
        }
        Ok(Self { members })
    }

    pub fn get(&self, id: MemberId) -> Option<&MemberRecord> {
        self.members.get(&id)
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in identity order
    pub fn iter(&self) -> impl Iterator<Item = &MemberRecord> {
        self.members.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.members.keys().copied()
    }

    pub(crate) fn upsert(&mut self, record: MemberRecord) {
        self.members.insert(record.id, record);
    }

    pub(crate) fn remove(&mut self, id: MemberId) -> Option<MemberRecord> {
        self.members.remove(&id)
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.members.values().filter(|m| m.role == role).count()
    }
}

impl TryFrom<Vec<MemberRecord>> for Roster {
    type Error = ValhallaError;

    fn try_from(records: Vec<MemberRecord>) -> Result<Self> {
        Roster::from_records(records)
    }
}

impl From<Roster> for Vec<MemberRecord> {
    fn from(roster: Roster) -> Self {
        roster.members.into_values().collect()
    }
}

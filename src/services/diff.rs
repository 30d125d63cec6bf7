//! Diff engine
//!
//! Computes the joined / left / changed decomposition between two rosters.
//! Pure: no I/O, no side effects.

use crate::models::{Delta, FieldChange, MemberChange, MemberRecord, Roster};

/// Difference from `source` to `target`.
///
/// Identity is compared by account id only. Members present on both sides are
/// compared over card, title and role; every differing field is recorded.
pub fn diff(source: &Roster, target: &Roster) -> Delta {
    let mut delta = Delta::default();

    for record in source.iter() {
        match target.get(record.id) {
            None => delta.left.push(record.clone()),
            Some(other) => {
                let changes = field_changes(record, other);
                if !changes.is_empty() {
                    delta.changed.push(MemberChange { id: record.id, changes });
                }
            }
        }
    }

    delta.joined = target
        .iter()
        .filter(|record| !source.contains(record.id))
        .cloned()
        .collect();

    delta
}

fn field_changes(from: &MemberRecord, to: &MemberRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if from.card != to.card {
        changes.push(FieldChange::Card { from: from.card.clone(), to: to.card.clone() });
    }
    if from.title != to.title {
        changes.push(FieldChange::Title { from: from.title.clone(), to: to.title.clone() });
    }
    if from.role != to.role {
        changes.push(FieldChange::Role { from: from.role, to: to.role });
    }
    changes
}

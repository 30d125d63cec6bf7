//! Restore planner
//!
//! Turns a desired snapshot and the current live roster into an ordered
//! [`RestorePlan`]. Deterministic and free of I/O; dry runs use the same plan.

use tracing::debug;

use crate::models::{
    Action, LiveRoster, MaterializedSnapshot, PlanOptions, RejectReason, RejectedChange,
    RestorePlan, Role,
};
use crate::services::diff::diff;

/// Build the plan converging `live` toward `desired`.
///
/// Members of the snapshot missing from the live group are reported as
/// unreachable; live members missing from the snapshot are left alone.
/// Actions are ordered revoke-admin, then card/title in identity order,
/// then grant-admin.
pub fn plan(desired: &MaterializedSnapshot, live: &LiveRoster, options: &PlanOptions) -> RestorePlan {
    let delta = diff(&live.roster, &desired.roster);

    let mut excluded = Vec::new();
    let mut unreachable = Vec::new();
    for member in &delta.joined {
        if options.exclude.contains(&member.id) {
            excluded.push(member.id);
        } else {
            unreachable.push(member.id);
        }
    }

    let mut revokes = Vec::new();
    let mut attributes = Vec::new();
    let mut grants = Vec::new();
    let mut rejected = Vec::new();

    for change in &delta.changed {
        if options.exclude.contains(&change.id) {
            excluded.push(change.id);
            continue;
        }

        // Field pairs are (live, desired)
        if options.restore_card {
            if let Some((current, wanted)) = change.card() {
                attributes.push(Action::set_card(change.id, wanted, current));
            }
        }
        if options.restore_title {
            if let Some((current, wanted)) = change.title() {
                attributes.push(Action::set_title(change.id, wanted, current));
            }
        }
        if options.restore_admin {
            if let Some((current, wanted)) = change.role() {
                match (current, wanted) {
                    (_, Role::Owner) => rejected.push(RejectedChange {
                        member: change.id,
                        reason: RejectReason::OwnershipTransfer,
                    }),
                    (Role::Owner, _) => rejected.push(RejectedChange {
                        member: change.id,
                        reason: RejectReason::OwnerDemotion,
                    }),
                    (Role::Member, Role::Admin) => grants.push(Action::set_admin(change.id, true)),
                    (Role::Admin, Role::Member) => revokes.push(Action::set_admin(change.id, false)),
                    _ => {}
                }
            }
        }
    }

    excluded.sort();

    let mut actions = revokes;
    actions.append(&mut attributes);
    actions.append(&mut grants);

    debug!(
        source_group = %desired.meta.group_id,
        sequence = desired.meta.sequence,
        target_group = %live.group_id,
        actions = actions.len(),
        unreachable = unreachable.len(),
        rejected = rejected.len(),
        "Restore plan built"
    );

    RestorePlan::new(
        desired.meta.group_id,
        desired.meta.sequence,
        live.group_id,
        actions,
        unreachable,
        rejected,
        excluded,
    )
}

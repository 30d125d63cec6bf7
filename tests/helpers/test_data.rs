//! Roster builders and fixed identities shared by the tests

use std::time::Duration;

use Valhalla::models::{GroupId, MemberId, MemberRecord, Role};
use Valhalla::services::RetryPolicy;

pub const GROUP: GroupId = GroupId(100_200_300);
pub const OTHER_GROUP: GroupId = GroupId(400_500_600);
pub const BOT: MemberId = MemberId(10_000);

pub fn member(id: i64, card: &str) -> MemberRecord {
    MemberRecord::new(MemberId(id), format!("user{id}")).with_card(card)
}

pub fn admin(id: i64, card: &str) -> MemberRecord {
    member(id, card).with_role(Role::Admin)
}

pub fn owner(id: i64, card: &str) -> MemberRecord {
    member(id, card).with_role(Role::Owner)
}

/// Retries without jitter so backoff waits can be asserted exactly
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        multiplier: 2.0,
        jitter: false,
    }
}

//! External group API gateway
//!
//! The [`Gateway`] trait is the only way the engine touches a remote group.
//! A handle is passed explicitly into every capture and execution call.
//! Implementations validate remote payloads into strict [`MemberRecord`]s.

pub mod onebot;

pub use onebot::OneBotGateway;

use async_trait::async_trait;

use crate::models::{GroupId, MemberId, MemberRecord, Roster};
use crate::utils::errors::GatewayResult;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Current roster of the group, fetched fresh
    async fn fetch_roster(&self, group_id: GroupId) -> GatewayResult<Roster>;

    /// Current record of one member, `None` when not in the group
    async fn fetch_member(&self, group_id: GroupId, member_id: MemberId) -> GatewayResult<Option<MemberRecord>> {
        Ok(self.fetch_roster(group_id).await?.get(member_id).cloned())
    }

    async fn set_card(&self, group_id: GroupId, member_id: MemberId, card: &str) -> GatewayResult<()>;

    async fn set_title(&self, group_id: GroupId, member_id: MemberId, title: &str) -> GatewayResult<()>;

    async fn set_admin(&self, group_id: GroupId, member_id: MemberId, enable: bool) -> GatewayResult<()>;

    /// Account the gateway acts as
    async fn self_id(&self) -> GatewayResult<MemberId>;
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::error::DbResult, models::GroupMembership};

/// Read-only view of group memberships and designated group admins.
#[async_trait]
pub trait GroupMembershipRepo: Send + Sync {
    /// Get a user's membership row for a group.
    async fn get_membership(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DbResult<Option<GroupMembership>>;

    /// Get the designated admin of a group.
    ///
    /// Returns `Ok(None)` if the group does not exist or has no admin.
    async fn get_group_admin(&self, group_id: Uuid) -> DbResult<Option<Uuid>>;
}

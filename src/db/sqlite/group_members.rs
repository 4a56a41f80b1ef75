use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{parse_column, parse_uuid};
use crate::{
    db::{error::DbResult, repos::GroupMembershipRepo},
    models::GroupMembership,
};

pub struct SqliteGroupMembershipRepo {
    pool: SqlitePool,
}

impl SqliteGroupMembershipRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupMembershipRepo for SqliteGroupMembershipRepo {
    async fn get_membership(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DbResult<Option<GroupMembership>> {
        let result = sqlx::query(
            r#"
            SELECT role
            FROM group_members
            WHERE user_id = ? AND group_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(group_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        result
            .map(|row| {
                Ok(GroupMembership {
                    user_id,
                    group_id,
                    role: parse_column(&row.get::<String, _>("role"))?,
                })
            })
            .transpose()
    }

    async fn get_group_admin(&self, group_id: Uuid) -> DbResult<Option<Uuid>> {
        let admin: Option<Option<String>> =
            sqlx::query_scalar("SELECT group_admin_id FROM groups WHERE id = ?")
                .bind(group_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        admin.flatten().map(|s| parse_uuid(&s)).transpose()
    }
}

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::GroupMembershipRepo,
    },
    models::GroupMembership,
};

pub struct PostgresGroupMembershipRepo {
    read_pool: PgPool,
}

impl PostgresGroupMembershipRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        Self {
            read_pool: read_pool.unwrap_or(write_pool),
        }
    }
}

#[async_trait]
impl GroupMembershipRepo for PostgresGroupMembershipRepo {
    async fn get_membership(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> DbResult<Option<GroupMembership>> {
        let result = sqlx::query(
            r#"
            SELECT role
            FROM group_members
            WHERE user_id = $1 AND group_id = $2
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_optional(&self.read_pool)
        .await?;

        result
            .map(|row| {
                Ok(GroupMembership {
                    user_id,
                    group_id,
                    role: row
                        .get::<String, _>("role")
                        .parse()
                        .map_err(DbError::Internal)?,
                })
            })
            .transpose()
    }

    async fn get_group_admin(&self, group_id: Uuid) -> DbResult<Option<Uuid>> {
        let admin: Option<Option<Uuid>> =
            sqlx::query_scalar("SELECT group_admin_id FROM groups WHERE id = $1")
                .bind(group_id)
                .fetch_optional(&self.read_pool)
                .await?;

        Ok(admin.flatten())
    }
}

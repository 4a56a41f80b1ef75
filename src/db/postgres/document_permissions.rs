use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::DocumentPermissionRepo,
    },
    models::{DocumentPermission, EntityType, PermissionType},
};

pub struct PostgresDocumentPermissionRepo {
    read_pool: PgPool,
}

impl PostgresDocumentPermissionRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        Self {
            read_pool: read_pool.unwrap_or(write_pool),
        }
    }
}

#[async_trait]
impl DocumentPermissionRepo for PostgresDocumentPermissionRepo {
    async fn get_permission(
        &self,
        document_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> DbResult<Option<DocumentPermission>> {
        let granted: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT permission_type
            FROM document_permissions
            WHERE document_id = $1 AND entity_type = $2 AND entity_id = $3
            "#,
        )
        .bind(document_id)
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.read_pool)
        .await?;

        let strongest = granted
            .iter()
            .map(|s| s.parse::<PermissionType>().map_err(DbError::Internal))
            .collect::<DbResult<Vec<_>>>()?
            .into_iter()
            .max();

        Ok(strongest.map(|permission_type| DocumentPermission {
            document_id,
            entity_type,
            entity_id,
            permission_type,
        }))
    }
}

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_column;
use crate::{
    db::{error::DbResult, repos::DocumentPermissionRepo},
    models::{DocumentPermission, EntityType, PermissionType},
};

pub struct SqliteDocumentPermissionRepo {
    pool: SqlitePool,
}

impl SqliteDocumentPermissionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentPermissionRepo for SqliteDocumentPermissionRepo {
    async fn get_permission(
        &self,
        document_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> DbResult<Option<DocumentPermission>> {
        let rows = sqlx::query(
            r#"
            SELECT permission_type
            FROM document_permissions
            WHERE document_id = ? AND entity_type = ? AND entity_id = ?
            "#,
        )
        .bind(document_id.to_string())
        .bind(entity_type.as_str())
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let strongest = rows
            .iter()
            .map(|row| parse_column::<PermissionType>(&row.get::<String, _>("permission_type")))
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

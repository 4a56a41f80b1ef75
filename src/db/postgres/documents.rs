use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    db::{
        error::{DbError, DbResult},
        repos::DocumentRepo,
    },
    models::DocumentAccess,
};

pub struct PostgresDocumentRepo {
    read_pool: PgPool,
}

impl PostgresDocumentRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        Self {
            read_pool: read_pool.unwrap_or(write_pool),
        }
    }
}

#[async_trait]
impl DocumentRepo for PostgresDocumentRepo {
    async fn get_access(&self, id: Uuid) -> DbResult<Option<DocumentAccess>> {
        let result = sqlx::query(
            r#"
            SELECT id, access_type, created_by, group_id
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        match result {
            Some(row) => Ok(Some(DocumentAccess {
                id: row.get("id"),
                access_type: row
                    .get::<String, _>("access_type")
                    .parse()
                    .map_err(DbError::Internal)?,
                owner_id: row.get("created_by"),
                group_id: row.get("group_id"),
            })),
            None => Ok(None),
        }
    }
}

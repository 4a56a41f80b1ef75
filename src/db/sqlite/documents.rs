use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{parse_column, parse_uuid};
use crate::{
    db::{error::DbResult, repos::DocumentRepo},
    models::DocumentAccess,
};

pub struct SqliteDocumentRepo {
    pool: SqlitePool,
}

impl SqliteDocumentRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepo for SqliteDocumentRepo {
    async fn get_access(&self, id: Uuid) -> DbResult<Option<DocumentAccess>> {
        let result = sqlx::query(
            r#"
            SELECT id, access_type, created_by, group_id
            FROM documents
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match result {
            Some(row) => {
                let created_by: Option<String> = row.get("created_by");
                let group_id: Option<String> = row.get("group_id");

                Ok(Some(DocumentAccess {
                    id: parse_uuid(&row.get::<String, _>("id"))?,
                    access_type: parse_column(&row.get::<String, _>("access_type"))?,
                    owner_id: created_by.map(|s| parse_uuid(&s)).transpose()?,
                    group_id: group_id.map(|s| parse_uuid(&s)).transpose()?,
                }))
            }
            None => Ok(None),
        }
    }
}

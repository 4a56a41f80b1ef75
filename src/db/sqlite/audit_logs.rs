use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{error::DbResult, repos::AuditLogRepo},
    models::{AuditLog, AuditLogQuery, CreateAuditLog},
};

pub struct SqliteAuditLogRepo {
    pool: SqlitePool,
}

impl SqliteAuditLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_log(row: &SqliteRow) -> DbResult<AuditLog> {
        let actor_id: Option<String> = row.get("actor_id");
        let resource_id: Option<String> = row.get("resource_id");
        let details_str: String = row.get("details");

        Ok(AuditLog {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            timestamp: row.get::<DateTime<Utc>, _>("timestamp"),
            actor_id: actor_id.map(|s| parse_uuid(&s)).transpose()?,
            action: row.get("action"),
            resource_type: row.get("resource_type"),
            resource_id: resource_id.map(|s| parse_uuid(&s)).transpose()?,
            details: serde_json::from_str(&details_str)?,
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        })
    }
}

#[async_trait]
impl AuditLogRepo for SqliteAuditLogRepo {
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let details_json = serde_json::to_string(&input.details)?;

        sqlx::query(
            r#"
            INSERT INTO authz_audit_logs (
                id, timestamp, actor_id, action, resource_type,
                resource_id, details, ip_address, user_agent
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(now)
        .bind(input.actor_id.map(|id| id.to_string()))
        .bind(&input.action)
        .bind(&input.resource_type)
        .bind(input.resource_id.map(|id| id.to_string()))
        .bind(&details_json)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(AuditLog {
            id,
            timestamp: now,
            actor_id: input.actor_id,
            action: input.action,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            details: input.details,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
        })
    }

    async fn list(&self, query: AuditLogQuery) -> DbResult<Vec<AuditLog>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(actor_id) = &query.actor_id {
            conditions.push("actor_id = ?");
            params.push(actor_id.to_string());
        }
        if let Some(action) = &query.action {
            conditions.push("action = ?");
            params.push(action.clone());
        }
        if let Some(resource_id) = &query.resource_id {
            conditions.push("resource_id = ?");
            params.push(resource_id.to_string());
        }
        if let Some(from) = &query.from {
            conditions.push("timestamp >= ?");
            params.push(from.to_rfc3339());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            r#"
            SELECT id, timestamp, actor_id, action, resource_type,
                   resource_id, details, ip_address, user_agent
            FROM authz_audit_logs
            {}
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
            where_clause
        );

        let mut query_builder = sqlx::query(&sql);
        for param in &params {
            query_builder = query_builder.bind(param);
        }
        query_builder = query_builder.bind(query.effective_limit());

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_log).collect()
    }
}

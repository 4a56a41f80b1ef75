use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    db::{error::DbResult, repos::AuditLogRepo},
    models::{AuditLog, AuditLogQuery, CreateAuditLog},
};

pub struct PostgresAuditLogRepo {
    write_pool: PgPool,
    read_pool: PgPool,
}

impl PostgresAuditLogRepo {
    pub fn new(write_pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| write_pool.clone());
        Self {
            write_pool,
            read_pool,
        }
    }

    fn row_to_log(row: &PgRow) -> AuditLog {
        AuditLog {
            id: row.get("id"),
            timestamp: row.get("timestamp"),
            actor_id: row.get("actor_id"),
            action: row.get("action"),
            resource_type: row.get("resource_type"),
            resource_id: row.get("resource_id"),
            details: row.get("details"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        }
    }
}

#[async_trait]
impl AuditLogRepo for PostgresAuditLogRepo {
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        let row = sqlx::query(
            r#"
            INSERT INTO authz_audit_logs (
                id, timestamp, actor_id, action, resource_type,
                resource_id, details, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, timestamp, actor_id, action, resource_type,
                      resource_id, details, ip_address, user_agent
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .bind(input.actor_id)
        .bind(&input.action)
        .bind(&input.resource_type)
        .bind(input.resource_id)
        .bind(&input.details)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .fetch_one(&self.write_pool)
        .await?;

        Ok(Self::row_to_log(&row))
    }

    async fn list(&self, query: AuditLogQuery) -> DbResult<Vec<AuditLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, actor_id, action, resource_type,
                   resource_id, details, ip_address, user_agent
            FROM authz_audit_logs
            WHERE ($1::uuid IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR action = $2)
              AND ($3::uuid IS NULL OR resource_id = $3)
              AND ($4::timestamptz IS NULL OR timestamp >= $4)
            ORDER BY timestamp DESC, id DESC
            LIMIT $5
            "#,
        )
        .bind(query.actor_id)
        .bind(&query.action)
        .bind(query.resource_id)
        .bind(query.from)
        .bind(query.effective_limit())
        .fetch_all(&self.read_pool)
        .await?;

        Ok(rows.iter().map(Self::row_to_log).collect())
    }
}

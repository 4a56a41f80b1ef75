use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{AuditLog, AuditLogQuery, CreateAuditLog},
};

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    /// Create a new audit log entry
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog>;

    /// List audit logs matching the query, newest first
    async fn list(&self, query: AuditLogQuery) -> DbResult<Vec<AuditLog>>;
}

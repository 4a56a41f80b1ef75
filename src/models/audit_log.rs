use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Audit action recorded for an allowed request.
pub const AUTHZ_ALLOW: &str = "authz.allow";
/// Audit action recorded for a denied request.
pub const AUTHZ_DENY: &str = "authz.deny";

/// An audit log entry recording an authorization decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    /// Unique identifier for this audit log entry
    pub id: Uuid,
    /// When the decision was made
    pub timestamp: DateTime<Utc>,
    /// Caller the decision was made for (None for anonymous requests)
    pub actor_id: Option<Uuid>,
    /// The action recorded ("authz.allow" or "authz.deny")
    pub action: String,
    /// Type of resource targeted ("document", "group", or "route")
    pub resource_type: String,
    /// ID of the targeted resource, when the request named one that parsed
    pub resource_id: Option<Uuid>,
    /// Decision details: route, method, rule, raw target ids
    pub details: JsonValue,
    /// Client IP address
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
}

/// Input for creating a new audit log entry
#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Query parameters for listing audit logs
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    /// Filter by actor ID
    pub actor_id: Option<Uuid>,
    /// Filter by action (e.g., "authz.deny")
    pub action: Option<String>,
    /// Filter by resource ID
    pub resource_id: Option<Uuid>,
    /// Start of time range (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Maximum number of results to return (default 100)
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub const DEFAULT_LIMIT: i64 = 100;

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 1000)
    }
}

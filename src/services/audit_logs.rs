use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::{
    authz::{AccessRequest, AuthzDecision},
    db::{DbPool, DbResult},
    models::{AUTHZ_ALLOW, AUTHZ_DENY, AuditLog, AuditLogQuery, Caller, CreateAuditLog},
};

/// One authorization decision, as seen by the audit trail.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub route_id: Option<String>,
    pub caller: Option<Caller>,
    pub request: AccessRequest,
    pub decision: AuthzDecision,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl DecisionRecord {
    fn into_entry(self) -> CreateAuditLog {
        let (resource_type, resource_id) = match (
            &self.request.target_document_id,
            &self.request.target_group_id,
        ) {
            (Some(doc), _) => ("document", Uuid::parse_str(doc.trim()).ok()),
            (None, Some(group)) => ("group", Uuid::parse_str(group.trim()).ok()),
            (None, None) => ("route", None),
        };

        let details = json!({
            "decision": if self.decision.allowed { "allow" } else { "deny" },
            "rule": self.decision.rule,
            "route": self.route_id,
            "method": self.request.method.as_str(),
            "document_id": self.request.target_document_id,
            "group_id": self.request.target_group_id,
            "caller_role": self.caller.map(|c| c.system_role),
        });

        CreateAuditLog {
            actor_id: self.caller.map(|c| c.id),
            action: if self.decision.allowed {
                AUTHZ_ALLOW
            } else {
                AUTHZ_DENY
            }
            .to_string(),
            resource_type: resource_type.to_string(),
            resource_id,
            details,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Service layer for audit log operations
#[derive(Clone)]
pub struct AuditLogService {
    db: Arc<DbPool>,
}

impl AuditLogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Create a new audit log entry
    pub async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        self.db.audit_logs().create(input).await
    }

    /// Record an authorization decision
    pub async fn record_decision(&self, record: DecisionRecord) -> DbResult<AuditLog> {
        self.create(record.into_entry()).await
    }

    /// List audit logs, newest first
    pub async fn list(&self, query: AuditLogQuery) -> DbResult<Vec<AuditLog>> {
        self.db.audit_logs().list(query).await
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::{
        authz::DecisionRule,
        db::InMemoryStore,
    };

    fn service() -> (Arc<InMemoryStore>, AuditLogService) {
        let store = Arc::new(InMemoryStore::new());
        let db = Arc::new(DbPool::from_memory(store.clone()));
        (store, AuditLogService::new(db))
    }

    #[tokio::test]
    async fn test_denial_recorded_against_document() {
        let (store, service) = service();
        let caller = Caller::user(Uuid::new_v4());
        let doc = Uuid::new_v4();

        let log = service
            .record_decision(DecisionRecord {
                route_id: Some("documents.delete".into()),
                caller: Some(caller),
                request: AccessRequest::new(Method::DELETE).with_document(doc.to_string()),
                decision: AuthzDecision::deny(DecisionRule::PermissionMissing),
                ip_address: Some("10.0.0.1".into()),
                user_agent: None,
            })
            .await
            .unwrap();

        assert_eq!(log.action, AUTHZ_DENY);
        assert_eq!(log.actor_id, Some(caller.id));
        assert_eq!(log.resource_type, "document");
        assert_eq!(log.resource_id, Some(doc));
        assert_eq!(log.details["rule"], "permission_missing");
        assert_eq!(log.details["route"], "documents.delete");
        assert_eq!(log.details["method"], "DELETE");
        assert_eq!(store.audit_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_target_keeps_raw_id_in_details() {
        let (_store, service) = service();

        let log = service
            .record_decision(DecisionRecord {
                route_id: None,
                caller: None,
                request: AccessRequest::new(Method::GET).with_group("not-a-uuid"),
                decision: AuthzDecision::deny(DecisionRule::MissingCaller),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();

        assert_eq!(log.actor_id, None);
        assert_eq!(log.resource_type, "group");
        assert_eq!(log.resource_id, None);
        assert_eq!(log.details["group_id"], "not-a-uuid");
    }

    #[tokio::test]
    async fn test_list_filters_by_action() {
        let (_store, service) = service();
        for decision in [
            AuthzDecision::allow(DecisionRule::PublicOperation),
            AuthzDecision::deny(DecisionRule::SystemRoleMismatch),
        ] {
            service
                .record_decision(DecisionRecord {
                    route_id: None,
                    caller: None,
                    request: AccessRequest::new(Method::GET),
                    decision,
                    ip_address: None,
                    user_agent: None,
                })
                .await
                .unwrap();
        }

        let denied = service
            .list(AuditLogQuery {
                action: Some(AUTHZ_DENY.into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].resource_type, "route");
    }
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{GroupRole, SystemRole};

/// Authorization configuration.
///
/// ```toml
/// [authz.audit]
/// log_allowed = false
/// log_denied = true
///
/// [[authz.routes]]
/// id = "reports.export"
/// method = "POST"
/// path = "/documents/{id}/export"
/// system_roles = ["ADMIN", "USER"]
/// path_document = "id"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzConfig {
    #[serde(default)]
    pub audit: AuditConfig,

    /// Route policies added to, or replacing by id, the built-in table.
    #[serde(default)]
    pub routes: Vec<RoutePolicyConfig>,
}

/// Which decisions are written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default)]
    pub log_allowed: bool,

    #[serde(default = "default_true")]
    pub log_denied: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_allowed: false,
            log_denied: true,
        }
    }
}

impl AuditConfig {
    pub fn should_log(&self, allowed: bool) -> bool {
        if allowed {
            self.log_allowed
        } else {
            self.log_denied
        }
    }
}

/// One route policy entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutePolicyConfig {
    pub id: String,
    /// HTTP method, case-insensitive.
    pub method: String,
    /// Router path template, e.g. `/documents/{id}`.
    pub path: String,

    #[serde(default)]
    pub system_roles: Option<BTreeSet<SystemRole>>,
    #[serde(default)]
    pub group_roles: Option<BTreeSet<GroupRole>>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub allow_list_access: bool,

    /// Path parameter holding the target document id.
    #[serde(default)]
    pub path_document: Option<String>,
    /// Path parameter holding the target group id.
    #[serde(default)]
    pub path_group: Option<String>,
    /// JSON body field holding the target document id.
    #[serde(default)]
    pub body_document: Option<String>,
    /// JSON body field holding the target group id.
    #[serde(default)]
    pub body_group: Option<String>,
}

fn default_true() -> bool {
    true
}

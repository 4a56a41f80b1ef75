//! Route policy table.
//!
//! Every protected operation is registered with a [`PolicyRequirement`] and a
//! description of where its target ids live. The authorization middleware
//! resolves the matched route here, so requirements are plain data fixed at
//! startup rather than metadata discovered per request.
//!
//! The built-in table covers the document-management API (documents, groups,
//! categories, tags, users, comments). Configuration may add routes or replace
//! built-in ones by id.

use std::collections::{BTreeMap, HashMap};

use http::Method;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::PolicyRequirement;
use crate::{
    config::RoutePolicyConfig,
    models::{GroupRole, SystemRole},
};

/// Where a route's target ids are found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_group: Option<String>,
}

impl RouteTarget {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn path_document(param: &str) -> Self {
        Self {
            path_document: Some(param.to_string()),
            ..Self::default()
        }
    }

    pub fn path_group(param: &str) -> Self {
        Self {
            path_group: Some(param.to_string()),
            ..Self::default()
        }
    }

    pub fn body_document(field: &str) -> Self {
        Self {
            body_document: Some(field.to_string()),
            ..Self::default()
        }
    }

    /// Whether the JSON body must be inspected.
    pub fn reads_body(&self) -> bool {
        self.body_document.is_some() || self.body_group.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A route and the requirement guarding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutePolicy {
    pub id: String,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub path: String,
    pub requirement: PolicyRequirement,
    #[serde(skip_serializing_if = "RouteTarget::is_empty")]
    pub target: RouteTarget,
}

fn serialize_method<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

impl RoutePolicy {
    pub fn new(id: &str, method: Method, path: &str, requirement: PolicyRequirement) -> Self {
        Self {
            id: id.to_string(),
            method,
            path: path.to_string(),
            requirement,
            target: RouteTarget::none(),
        }
    }

    pub fn with_target(mut self, target: RouteTarget) -> Self {
        self.target = target;
        self
    }
}

impl TryFrom<&RoutePolicyConfig> for RoutePolicy {
    type Error = RegistryError;

    fn try_from(config: &RoutePolicyConfig) -> Result<Self, Self::Error> {
        if config.id.trim().is_empty() {
            return Err(RegistryError::EmptyId);
        }
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| RegistryError::InvalidMethod {
                id: config.id.clone(),
                method: config.method.clone(),
            })?;
        if !config.path.starts_with('/') {
            return Err(RegistryError::InvalidPath {
                id: config.id.clone(),
                path: config.path.clone(),
            });
        }

        Ok(Self {
            id: config.id.clone(),
            method,
            path: config.path.clone(),
            requirement: PolicyRequirement {
                system_roles: config.system_roles.clone(),
                group_roles: config.group_roles.clone(),
                is_public: config.is_public,
                allow_list_access: config.allow_list_access,
            },
            target: RouteTarget {
                path_document: config.path_document.clone(),
                path_group: config.path_group.clone(),
                body_document: config.body_document.clone(),
                body_group: config.body_group.clone(),
            },
        })
    }
}

/// Errors building the route table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Route policy id cannot be empty")]
    EmptyId,

    #[error("Route policy '{id}' has invalid method '{method}'")]
    InvalidMethod { id: String, method: String },

    #[error("Route policy '{id}' has invalid path '{path}' (must start with '/')")]
    InvalidPath { id: String, path: String },

    #[error("Route policies '{first}' and '{second}' both register {method} {path}")]
    DuplicateRoute {
        first: String,
        second: String,
        method: String,
        path: String,
    },
}

/// Lookup table from route id, and from (method, path template), to policy.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicyRegistry {
    by_id: BTreeMap<String, RoutePolicy>,
    by_route: HashMap<(Method, String), String>,
}

impl RoutePolicyRegistry {
    pub fn new(policies: impl IntoIterator<Item = RoutePolicy>) -> Result<Self, RegistryError> {
        let mut by_id = BTreeMap::new();
        for policy in policies {
            by_id.insert(policy.id.clone(), policy);
        }
        Self::index(by_id)
    }

    /// The built-in table with configured routes applied on top.
    pub fn with_overrides(routes: &[RoutePolicyConfig]) -> Result<Self, RegistryError> {
        let mut by_id: BTreeMap<String, RoutePolicy> = builtin_policies()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        for route in routes {
            let policy = RoutePolicy::try_from(route)?;
            if by_id.contains_key(&policy.id) {
                tracing::debug!(route_id = %policy.id, "Overriding built-in route policy");
            }
            by_id.insert(policy.id.clone(), policy);
        }

        Self::index(by_id)
    }

    pub fn builtin() -> Self {
        // The built-in table is free of duplicates; the unit tests pin that down.
        Self::with_overrides(&[]).unwrap_or_default()
    }

    fn index(by_id: BTreeMap<String, RoutePolicy>) -> Result<Self, RegistryError> {
        let mut by_route: HashMap<(Method, String), String> = HashMap::new();
        for policy in by_id.values() {
            let key = (policy.method.clone(), policy.path.clone());
            if let Some(first) = by_route.get(&key) {
                return Err(RegistryError::DuplicateRoute {
                    first: first.clone(),
                    second: policy.id.clone(),
                    method: policy.method.to_string(),
                    path: policy.path.clone(),
                });
            }
            by_route.insert(key, policy.id.clone());
        }
        Ok(Self { by_id, by_route })
    }

    pub fn get(&self, id: &str) -> Option<&RoutePolicy> {
        self.by_id.get(id)
    }

    /// Find the policy for a matched route. HEAD falls back to the GET entry.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&RoutePolicy> {
        let lookup = |m: &Method| {
            self.by_route
                .get(&(m.clone(), path.to_string()))
                .and_then(|id| self.by_id.get(id))
        };
        lookup(method).or_else(|| {
            if *method == Method::HEAD {
                lookup(&Method::GET)
            } else {
                None
            }
        })
    }

    /// Policies sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn system(roles: &[SystemRole]) -> PolicyRequirement {
    PolicyRequirement::default().with_system_roles(roles.iter().copied())
}

fn builtin_policies() -> Vec<RoutePolicy> {
    use GroupRole as G;
    use SystemRole::{Admin, User};

    let public = PolicyRequirement::public;
    let open = PolicyRequirement::default;
    let doc = || RouteTarget::path_document("id");
    let group = || RouteTarget::path_group("id");

    vec![
        // Documents
        RoutePolicy::new("documents.upload", Method::POST, "/documents/upload", system(&[Admin, User])),
        RoutePolicy::new("documents.upload_image", Method::POST, "/documents/upload-image-document", system(&[Admin, User])),
        RoutePolicy::new("documents.public", Method::GET, "/documents/public", public()),
        RoutePolicy::new("documents.search", Method::GET, "/documents/search", public()),
        RoutePolicy::new("documents.search_suggestions", Method::GET, "/documents/fts-search-suggestions", public()),
        RoutePolicy::new("documents.search_categories", Method::GET, "/documents/search-categories", public()),
        RoutePolicy::new("documents.by_category", Method::GET, "/documents/by-category", public()),
        RoutePolicy::new("documents.admin_list", Method::GET, "/documents/admin", system(&[Admin])),
        RoutePolicy::new("documents.admin_pending", Method::GET, "/documents/admin/pending", system(&[Admin])),
        RoutePolicy::new("documents.admin_stats", Method::GET, "/documents/admin/stats", system(&[Admin])),
        RoutePolicy::new("documents.user_stats", Method::GET, "/documents/user/stats", system(&[Admin, User])),
        RoutePolicy::new("documents.mine", Method::GET, "/documents/my-documents", system(&[Admin, User])),
        RoutePolicy::new("documents.request_approval", Method::POST, "/documents/{id}/request-approval", system(&[User])).with_target(doc()),
        RoutePolicy::new("documents.approve", Method::POST, "/documents/{id}/approve", system(&[Admin])).with_target(doc()),
        RoutePolicy::new("documents.reject", Method::POST, "/documents/{id}/reject", system(&[Admin])).with_target(doc()),
        RoutePolicy::new("documents.get", Method::GET, "/documents/{id}", public()).with_target(doc()),
        RoutePolicy::new("documents.update", Method::PUT, "/documents/{id}", system(&[Admin, User])).with_target(doc()),
        RoutePolicy::new("documents.remove_from_group", Method::PATCH, "/documents/{id}/remove-from-group", system(&[Admin, User])).with_target(doc()),
        RoutePolicy::new("documents.delete", Method::DELETE, "/documents/{id}", system(&[Admin, User])).with_target(doc()),
        RoutePolicy::new("documents.like", Method::POST, "/documents/{id}/like", system(&[Admin, User])).with_target(doc()),
        RoutePolicy::new("documents.dislike", Method::POST, "/documents/{id}/dislike", system(&[Admin, User])).with_target(doc()),
        RoutePolicy::new("documents.audit_logs", Method::GET, "/documents/audit-logs/{id}", system(&[Admin, User])).with_target(doc()),
        // Groups
        RoutePolicy::new("groups.create", Method::POST, "/groups", system(&[Admin, User])),
        RoutePolicy::new("groups.list", Method::GET, "/groups", system(&[Admin, User])),
        RoutePolicy::new("groups.mine", Method::GET, "/groups/me", system(&[Admin, User])),
        RoutePolicy::new("groups.get", Method::GET, "/groups/{id}", system(&[Admin, User]).with_group_roles([G::Admin, G::Member])).with_target(group()),
        RoutePolicy::new("groups.update", Method::PUT, "/groups/{id}", system(&[Admin, User])).with_target(group()),
        RoutePolicy::new("groups.delete", Method::DELETE, "/groups/{id}", system(&[Admin, User])).with_target(group()),
        RoutePolicy::new("groups.members_add", Method::POST, "/groups/{id}/members", system(&[Admin, User])).with_target(group()),
        RoutePolicy::new("groups.members_bulk_add", Method::POST, "/groups/{id}/members/bulk", system(&[Admin, User])).with_target(group()),
        RoutePolicy::new("groups.members_remove", Method::DELETE, "/groups/{id}/members/{user_id}", system(&[Admin, User])).with_target(group()),
        RoutePolicy::new("groups.members_set_role", Method::PATCH, "/groups/{id}/members/{user_id}/role", system(&[Admin, User])).with_target(group()),
        // Categories
        RoutePolicy::new("categories.create", Method::POST, "/categories/create", system(&[Admin])),
        RoutePolicy::new("categories.list", Method::GET, "/categories", public()),
        RoutePolicy::new("categories.get", Method::GET, "/categories/{id}", public()),
        RoutePolicy::new("categories.by_slug", Method::GET, "/categories/slug/{slug}", public()),
        RoutePolicy::new("categories.update", Method::PUT, "/categories/{id}", system(&[Admin])),
        RoutePolicy::new("categories.delete", Method::DELETE, "/categories/{id}", system(&[Admin])),
        // Tags
        RoutePolicy::new("tags.create", Method::POST, "/tags", system(&[Admin, User])),
        RoutePolicy::new("tags.list", Method::GET, "/tags", open()),
        RoutePolicy::new("tags.get", Method::GET, "/tags/{id}", open()),
        RoutePolicy::new("tags.update", Method::PUT, "/tags/{id}", system(&[Admin])),
        RoutePolicy::new("tags.delete", Method::DELETE, "/tags/{id}", system(&[Admin])),
        RoutePolicy::new("tags.attach", Method::POST, "/tags/document", system(&[Admin, User])).with_target(RouteTarget::body_document("document_id")),
        RoutePolicy::new("tags.detach", Method::DELETE, "/tags/document/{document_id}/tag/{tag_id}", system(&[Admin, User])).with_target(RouteTarget::path_document("document_id")),
        RoutePolicy::new("tags.for_document", Method::GET, "/tags/document/{document_id}", open()).with_target(RouteTarget::path_document("document_id")),
        RoutePolicy::new("document_tags.attach", Method::POST, "/document-tags", system(&[Admin, User])).with_target(RouteTarget::body_document("document_id")),
        RoutePolicy::new("document_tags.detach", Method::DELETE, "/document-tags/{document_id}/{tag_id}", system(&[Admin, User])).with_target(RouteTarget::path_document("document_id")),
        RoutePolicy::new("document_tags.for_document", Method::GET, "/document-tags/document/{document_id}", open()).with_target(RouteTarget::path_document("document_id")),
        // Users
        RoutePolicy::new("users.list", Method::GET, "/users", system(&[Admin])),
        RoutePolicy::new("users.profile", Method::GET, "/users/profile/{id}", open()),
        RoutePolicy::new("users.stats", Method::GET, "/users/stats", system(&[Admin])),
        RoutePolicy::new("users.update_avatar", Method::PATCH, "/users/avatar", system(&[Admin, User])),
        RoutePolicy::new("users.update_profile", Method::PATCH, "/users/profile", system(&[Admin, User])),
        // Comments
        RoutePolicy::new("comments.create", Method::POST, "/comment", system(&[User])).with_target(RouteTarget::body_document("document_id")),
    ]
}

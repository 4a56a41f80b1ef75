use std::{sync::Arc, time::Instant};

use serde::Serialize;

use super::{AccessRequest, AuthzError, PolicyRequirement};
use crate::{
    db::{DocumentPermissionRepo, DocumentRepo, GroupMembershipRepo},
    models::{AccessType, Caller, DocumentAccess, EntityType, GroupRole, SystemRole},
    observability::metrics,
};

/// The rule that produced a verdict.
///
/// Recorded in logs, metrics, and the audit trail. Never sent to the caller:
/// every denial looks the same from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    PublicOperation,
    NoPolicy,
    MissingCaller,
    SystemAdmin,
    SystemRoleMismatch,
    GuestAllowList,
    GuestListing,
    GuestMissingTarget,
    GuestPublicDocument,
    GuestRestrictedDocument,
    DocumentNotFound,
    GroupNotFound,
    DocumentWithoutGroup,
    GroupAdmin,
    NotGroupMember,
    GroupRoleMismatch,
    GroupRoleAdmin,
    GroupMemberRead,
    GroupMemberWrite,
    GroupListing,
    MissingGroupTarget,
    /// The route names a target but the request's target could not be read.
    MalformedTarget,
    DocumentOwner,
    PermissionGranted,
    PermissionMissing,
    PermissionInsufficient,
    DefaultAllow,
}

impl DecisionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionRule::PublicOperation => "public_operation",
            DecisionRule::NoPolicy => "no_policy",
            DecisionRule::MissingCaller => "missing_caller",
            DecisionRule::SystemAdmin => "system_admin",
            DecisionRule::SystemRoleMismatch => "system_role_mismatch",
            DecisionRule::GuestAllowList => "guest_allow_list",
            DecisionRule::GuestListing => "guest_listing",
            DecisionRule::GuestMissingTarget => "guest_missing_target",
            DecisionRule::GuestPublicDocument => "guest_public_document",
            DecisionRule::GuestRestrictedDocument => "guest_restricted_document",
            DecisionRule::DocumentNotFound => "document_not_found",
            DecisionRule::GroupNotFound => "group_not_found",
            DecisionRule::DocumentWithoutGroup => "document_without_group",
            DecisionRule::GroupAdmin => "group_admin",
            DecisionRule::NotGroupMember => "not_group_member",
            DecisionRule::GroupRoleMismatch => "group_role_mismatch",
            DecisionRule::GroupRoleAdmin => "group_role_admin",
            DecisionRule::GroupMemberRead => "group_member_read",
            DecisionRule::GroupMemberWrite => "group_member_write",
            DecisionRule::GroupListing => "group_listing",
            DecisionRule::MissingGroupTarget => "missing_group_target",
            DecisionRule::MalformedTarget => "malformed_target",
            DecisionRule::DocumentOwner => "document_owner",
            DecisionRule::PermissionGranted => "permission_granted",
            DecisionRule::PermissionMissing => "permission_missing",
            DecisionRule::PermissionInsufficient => "permission_insufficient",
            DecisionRule::DefaultAllow => "default_allow",
        }
    }
}

impl std::fmt::Display for DecisionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict plus the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthzDecision {
    pub allowed: bool,
    pub rule: DecisionRule,
}

impl AuthzDecision {
    pub fn allow(rule: DecisionRule) -> Self {
        Self {
            allowed: true,
            rule,
        }
    }

    pub fn deny(rule: DecisionRule) -> Self {
        Self {
            allowed: false,
            rule,
        }
    }
}

/// Outcome of one phase: a verdict, or pass to the next phase.
enum Phase {
    Decided(AuthzDecision),
    Continue,
}

use Phase::{Continue, Decided};

/// Authorization decision engine.
///
/// Composes system roles, public and allow-list exemptions, group roles, and
/// per-document grants into one allow/deny verdict. The engine holds no
/// mutable state; every call reads a fresh snapshot from the stores.
#[derive(Clone)]
pub struct AuthzEngine {
    documents: Arc<dyn DocumentRepo>,
    memberships: Arc<dyn GroupMembershipRepo>,
    permissions: Arc<dyn DocumentPermissionRepo>,
}

impl AuthzEngine {
    pub fn new(
        documents: Arc<dyn DocumentRepo>,
        memberships: Arc<dyn GroupMembershipRepo>,
        permissions: Arc<dyn DocumentPermissionRepo>,
    ) -> Self {
        Self {
            documents,
            memberships,
            permissions,
        }
    }

    /// Decide whether `caller` may perform `request` under `requirement`.
    pub async fn evaluate(
        &self,
        requirement: &PolicyRequirement,
        caller: Option<&Caller>,
        request: &AccessRequest,
    ) -> Result<bool, AuthzError> {
        self.decide(requirement, caller, request)
            .await
            .map(|decision| decision.allowed)
    }

    /// Like [`evaluate`](Self::evaluate), but also reports which rule decided.
    pub async fn decide(
        &self,
        requirement: &PolicyRequirement,
        caller: Option<&Caller>,
        request: &AccessRequest,
    ) -> Result<AuthzDecision, AuthzError> {
        let started = Instant::now();
        let mut eval = Evaluation {
            engine: self,
            request,
            document: None,
        };

        let result = eval.run(requirement, caller).await;

        match &result {
            Ok(decision) => {
                tracing::debug!(
                    allowed = decision.allowed,
                    rule = %decision.rule,
                    caller_id = ?caller.map(|c| c.id),
                    caller_role = ?caller.map(|c| c.system_role),
                    method = %request.method,
                    document_id = ?request.target_document_id,
                    group_id = ?request.target_group_id,
                    "Authorization decision"
                );
                metrics::record_authz_decision(decision, started.elapsed());
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    caller_id = ?caller.map(|c| c.id),
                    method = %request.method,
                    document_id = ?request.target_document_id,
                    group_id = ?request.target_group_id,
                    "Authorization lookup failed"
                );
                metrics::record_authz_failure();
            }
        }

        result
    }
}

/// State for a single evaluation. The target document is fetched at most once.
struct Evaluation<'a> {
    engine: &'a AuthzEngine,
    request: &'a AccessRequest,
    document: Option<Option<DocumentAccess>>,
}

impl Evaluation<'_> {
    async fn run(
        &mut self,
        requirement: &PolicyRequirement,
        caller: Option<&Caller>,
    ) -> Result<AuthzDecision, AuthzError> {
        if requirement.is_public {
            return Ok(AuthzDecision::allow(DecisionRule::PublicOperation));
        }
        if !requirement.declares_roles() {
            return Ok(AuthzDecision::allow(DecisionRule::NoPolicy));
        }
        let Some(caller) = caller else {
            return Ok(AuthzDecision::deny(DecisionRule::MissingCaller));
        };

        if let Decided(d) = self.system_phase(requirement, caller).await? {
            return Ok(d);
        }
        if let Decided(d) = self.group_phase(requirement, caller).await? {
            return Ok(d);
        }
        if let Decided(d) = self.acl_phase(caller).await? {
            return Ok(d);
        }

        Ok(AuthzDecision::allow(DecisionRule::DefaultAllow))
    }

    async fn system_phase(
        &mut self,
        requirement: &PolicyRequirement,
        caller: &Caller,
    ) -> Result<Phase, AuthzError> {
        let Some(required) = &requirement.system_roles else {
            return Ok(Continue);
        };

        if caller.system_role == SystemRole::Admin {
            return Ok(Decided(AuthzDecision::allow(DecisionRule::SystemAdmin)));
        }
        if !required.contains(&caller.system_role) {
            return Ok(Decided(AuthzDecision::deny(
                DecisionRule::SystemRoleMismatch,
            )));
        }
        if caller.system_role != SystemRole::Guest {
            return Ok(Continue);
        }

        // Guests never fall through to the group or ACL phases.
        if requirement.allow_list_access {
            return Ok(Decided(AuthzDecision::allow(DecisionRule::GuestAllowList)));
        }
        if !self.request.has_document_target() {
            return Ok(Decided(if self.request.is_read() {
                AuthzDecision::allow(DecisionRule::GuestListing)
            } else {
                AuthzDecision::deny(DecisionRule::GuestMissingTarget)
            }));
        }

        let decision = match self.document().await? {
            None => AuthzDecision::deny(DecisionRule::DocumentNotFound),
            Some(doc) if doc.access_type == AccessType::Public && self.request.is_read() => {
                AuthzDecision::allow(DecisionRule::GuestPublicDocument)
            }
            Some(_) => AuthzDecision::deny(DecisionRule::GuestRestrictedDocument),
        };
        Ok(Decided(decision))
    }

    async fn group_phase(
        &mut self,
        requirement: &PolicyRequirement,
        caller: &Caller,
    ) -> Result<Phase, AuthzError> {
        let Some(required) = &requirement.group_roles else {
            return Ok(Continue);
        };

        let group_id = match self.request.group_uuid() {
            Some(Ok(id)) => id,
            Some(Err(())) => {
                return Ok(Decided(AuthzDecision::deny(DecisionRule::GroupNotFound)));
            }
            None if self.request.has_document_target() => match self.document().await? {
                None => return Ok(Decided(AuthzDecision::deny(DecisionRule::DocumentNotFound))),
                Some(doc) if doc.access_type != AccessType::Group => return Ok(Continue),
                Some(doc) => match doc.group_id {
                    Some(id) => id,
                    None => {
                        return Ok(Decided(AuthzDecision::deny(
                            DecisionRule::DocumentWithoutGroup,
                        )));
                    }
                },
            },
            None => {
                if requirement.requires_group_role(GroupRole::Member) && self.request.is_read() {
                    return Ok(Decided(AuthzDecision::allow(DecisionRule::GroupListing)));
                }
                tracing::warn!(
                    caller_id = %caller.id,
                    method = %self.request.method,
                    group_roles = ?required,
                    "Group roles declared but the request names no group or document"
                );
                return Ok(Decided(AuthzDecision::deny(
                    DecisionRule::MissingGroupTarget,
                )));
            }
        };

        let memberships = &self.engine.memberships;
        if memberships.get_group_admin(group_id).await? == Some(caller.id) {
            return Ok(Decided(AuthzDecision::allow(DecisionRule::GroupAdmin)));
        }

        let Some(membership) = memberships.get_membership(caller.id, group_id).await? else {
            return Ok(Decided(AuthzDecision::deny(DecisionRule::NotGroupMember)));
        };

        let decision = if !required.contains(&membership.role) {
            AuthzDecision::deny(DecisionRule::GroupRoleMismatch)
        } else {
            match membership.role {
                GroupRole::Admin => AuthzDecision::allow(DecisionRule::GroupRoleAdmin),
                GroupRole::Member if self.request.is_read() => {
                    AuthzDecision::allow(DecisionRule::GroupMemberRead)
                }
                GroupRole::Member => AuthzDecision::deny(DecisionRule::GroupMemberWrite),
            }
        };
        Ok(Decided(decision))
    }

    async fn acl_phase(&mut self, caller: &Caller) -> Result<Phase, AuthzError> {
        if !self.request.has_document_target() {
            return Ok(Continue);
        }

        let Some(doc) = self.document().await? else {
            return Ok(Decided(AuthzDecision::deny(DecisionRule::DocumentNotFound)));
        };
        if doc.access_type != AccessType::Private {
            return Ok(Continue);
        }
        if doc.is_owned_by(caller.id) {
            return Ok(Decided(AuthzDecision::allow(DecisionRule::DocumentOwner)));
        }

        let grant = self
            .engine
            .permissions
            .get_permission(doc.id, EntityType::User, caller.id)
            .await?;

        let decision = match grant {
            None => AuthzDecision::deny(DecisionRule::PermissionMissing),
            Some(p) if p.permission_type.allows(self.request.is_read()) => {
                AuthzDecision::allow(DecisionRule::PermissionGranted)
            }
            Some(_) => AuthzDecision::deny(DecisionRule::PermissionInsufficient),
        };
        Ok(Decided(decision))
    }

    /// The target document, fetched on first use.
    async fn document(&mut self) -> Result<Option<DocumentAccess>, AuthzError> {
        if let Some(cached) = &self.document {
            return Ok(cached.clone());
        }

        let fetched = match self.request.document_uuid() {
            Some(Ok(id)) => self.engine.documents.get_access(id).await?,
            Some(Err(())) => {
                tracing::debug!(
                    document_id = ?self.request.target_document_id,
                    "Target document id is not a UUID"
                );
                None
            }
            None => None,
        };

        self.document = Some(fetched.clone());
        Ok(fetched)
    }
}

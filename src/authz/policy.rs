//! Per-operation access requirements.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{GroupRole, SystemRole};

/// Access requirement declared on an operation.
///
/// `None` for a role set means "not declared", which is distinct from an
/// empty set: a declared-but-empty set is still a declaration and matches
/// nobody (a system ADMIN still overrides it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_roles: Option<BTreeSet<SystemRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_roles: Option<BTreeSet<GroupRole>>,
    /// Bypasses every other check.
    #[serde(default)]
    pub is_public: bool,
    /// Lets GUEST callers through unconditionally once their system role matches.
    #[serde(default)]
    pub allow_list_access: bool,
}

impl PolicyRequirement {
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::default()
        }
    }

    pub fn with_system_roles(mut self, roles: impl IntoIterator<Item = SystemRole>) -> Self {
        self.system_roles = Some(roles.into_iter().collect());
        self
    }

    pub fn with_group_roles(mut self, roles: impl IntoIterator<Item = GroupRole>) -> Self {
        self.group_roles = Some(roles.into_iter().collect());
        self
    }

    pub fn with_allow_list_access(mut self) -> Self {
        self.allow_list_access = true;
        self
    }

    /// Whether any role field is declared.
    pub fn declares_roles(&self) -> bool {
        self.system_roles.is_some() || self.group_roles.is_some()
    }

    pub fn requires_group_role(&self, role: GroupRole) -> bool {
        self.group_roles
            .as_ref()
            .is_some_and(|roles| roles.contains(&role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_declares_nothing() {
        let req = PolicyRequirement::default();
        assert!(!req.declares_roles());
        assert!(!req.is_public);
        assert!(!req.allow_list_access);
    }

    #[test]
    fn test_empty_set_is_a_declaration() {
        let req = PolicyRequirement::default().with_group_roles([]);
        assert!(req.declares_roles());
        assert!(!req.requires_group_role(GroupRole::Member));
    }

    #[test]
    fn test_deserialize_from_screaming_case() {
        let req: PolicyRequirement = serde_json::from_str(
            r#"{"system_roles":["USER","GUEST"],"group_roles":["MEMBER"],"allow_list_access":true}"#,
        )
        .unwrap();
        assert_eq!(
            req.system_roles,
            Some(BTreeSet::from([SystemRole::User, SystemRole::Guest]))
        );
        assert!(req.requires_group_role(GroupRole::Member));
        assert!(req.allow_list_access);
        assert!(!req.is_public);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<PolicyRequirement, _> =
            serde_json::from_str(r#"{"required_roles":["USER"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_omits_undeclared_roles() {
        let json = serde_json::to_value(PolicyRequirement::public()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"is_public": true, "allow_list_access": false})
        );
    }
}

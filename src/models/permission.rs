use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Level of an explicit document grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Read,
    Write,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Read => "READ",
            PermissionType::Write => "WRITE",
        }
    }

    /// Whether this grant covers a request. WRITE implies READ.
    pub fn allows(&self, read_only: bool) -> bool {
        match self {
            PermissionType::Write => true,
            PermissionType::Read => read_only,
        }
    }
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(PermissionType::Read),
            "WRITE" => Ok(PermissionType::Write),
            _ => Err(format!("Invalid permission type: {}", s)),
        }
    }
}

/// Kind of entity a grant is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    User,
    Group,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "USER",
            EntityType::Group => "GROUP",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(EntityType::User),
            "GROUP" => Ok(EntityType::Group),
            _ => Err(format!("Invalid entity type: {}", s)),
        }
    }
}

/// An ACL entry: an additive grant on one document to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPermission {
    pub document_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub permission_type: PermissionType,
}

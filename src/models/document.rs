use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-document visibility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessType {
    /// Visible to everyone, guests included.
    Public,
    /// Visible to the owner and to explicitly granted entities.
    Private,
    /// Scoped to the members of the document's group.
    Group,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Public => "PUBLIC",
            AccessType::Private => "PRIVATE",
            AccessType::Group => "GROUP",
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(AccessType::Public),
            "PRIVATE" => Ok(AccessType::Private),
            "GROUP" => Ok(AccessType::Group),
            _ => Err(format!("Invalid access type: {}", s)),
        }
    }
}

/// Read-only view of a document, limited to the fields access decisions need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAccess {
    pub id: Uuid,
    pub access_type: AccessType,
    /// Uploader of the document. `None` if the user row was removed.
    pub owner_id: Option<Uuid>,
    /// Owning group, if the document was shared into one.
    pub group_id: Option<Uuid>,
}

impl DocumentAccess {
    pub fn new(id: Uuid, access_type: AccessType) -> Self {
        Self {
            id,
            access_type,
            owner_id: None,
            group_id: None,
        }
    }

    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_group(mut self, group_id: Uuid) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == Some(user_id)
    }
}

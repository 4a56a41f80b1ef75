use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse-grained role at the whole-application level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemRole {
    /// Platform administrator. Passes every system-role check.
    Admin,
    /// Regular registered user.
    User,
    /// Read-mostly tier, limited to public content.
    Guest,
}

impl SystemRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemRole::Admin => "ADMIN",
            SystemRole::User => "USER",
            SystemRole::Guest => "GUEST",
        }
    }
}

impl std::fmt::Display for SystemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(SystemRole::Admin),
            "USER" => Ok(SystemRole::User),
            "GUEST" => Ok(SystemRole::Guest),
            _ => Err(format!("Invalid system role: {}", s)),
        }
    }
}

/// The already-authenticated identity an access decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    #[serde(rename = "role")]
    pub system_role: SystemRole,
}

impl Caller {
    pub fn new(id: Uuid, system_role: SystemRole) -> Self {
        Self { id, system_role }
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, SystemRole::Admin)
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(id, SystemRole::User)
    }

    pub fn guest(id: Uuid) -> Self {
        Self::new(id, SystemRole::Guest)
    }

    /// Build a caller from raw strings, as received from trusted headers or an API body.
    ///
    /// Returns `None` if either part is malformed; an unresolvable identity is
    /// treated as "no caller" rather than as an error.
    pub fn parse(id: &str, role: &str) -> Option<Self> {
        let id = Uuid::parse_str(id.trim()).ok()?;
        let system_role = role.parse().ok()?;
        Some(Self { id, system_role })
    }
}

mod audit_logs;
mod common;
mod document_permissions;
mod documents;
mod group_members;

pub use audit_logs::SqliteAuditLogRepo;
pub use document_permissions::SqliteDocumentPermissionRepo;
pub use documents::SqliteDocumentRepo;
pub use group_members::SqliteGroupMembershipRepo;

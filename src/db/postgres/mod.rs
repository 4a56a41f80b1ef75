mod audit_logs;
mod document_permissions;
mod documents;
mod group_members;

pub use audit_logs::PostgresAuditLogRepo;
pub use document_permissions::PostgresDocumentPermissionRepo;
pub use documents::PostgresDocumentRepo;
pub use group_members::PostgresGroupMembershipRepo;

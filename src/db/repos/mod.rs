//! Read-only store interfaces consumed by the authorization engine, plus the
//! audit log sink.

mod audit_logs;
mod document_permissions;
mod documents;
mod group_members;

pub use audit_logs::*;
pub use document_permissions::*;
pub use documents::*;
pub use group_members::*;

mod audit_log;
mod document;
mod group;
mod permission;
mod user;

pub use audit_log::*;
pub use document::*;
pub use group::*;
pub use permission::*;
pub use user::*;

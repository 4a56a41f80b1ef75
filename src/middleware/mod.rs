mod authz;
mod identity;

pub(crate) use authz::audit_decision;
pub use authz::authz_middleware;
pub use identity::{caller_from_headers, identity_middleware};

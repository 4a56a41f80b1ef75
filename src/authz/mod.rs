//! Document access authorization.
//!
//! A request is authorized in up to three phases:
//! 1. System role: the caller's system-wide role must be one the operation
//!    declares. System admins pass outright; guests get a narrow read-only
//!    path to public documents.
//! 2. Group: when the operation declares group roles, the caller's membership
//!    in the target group (or the target document's group) is checked.
//! 3. Document ACL: for targeted documents, the owner passes and anyone else
//!    needs an explicit per-document grant matching the HTTP method.
//!
//! Requirements are attached to routes through the [`RoutePolicyRegistry`].

mod engine;
mod error;
mod policy;
mod registry;
mod request;

pub use engine::{AuthzDecision, AuthzEngine, DecisionRule};
pub use error::AuthzError;
pub use policy::PolicyRequirement;
pub use registry::{RegistryError, RoutePolicy, RoutePolicyRegistry, RouteTarget};
pub use request::AccessRequest;

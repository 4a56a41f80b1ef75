//! docguard: access control for a document-management backend.
//!
//! The library holds the decision engine ([`authz::AuthzEngine`]), the store
//! interfaces it reads from ([`db`]), and an axum surface that enforces route
//! policies and answers standalone decision requests ([`build_app`]).

pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

use std::sync::Arc;

use tokio_util::task::TaskTracker;

pub use crate::routes::build_app;
use crate::{
    authz::{AuthzEngine, RoutePolicyRegistry},
    config::{ConfigError, DocguardConfig},
    db::DbPool,
    services::AuditLogService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DocguardConfig>,
    pub db: Arc<DbPool>,
    pub engine: AuthzEngine,
    /// Route policies, fixed at startup.
    pub registry: Arc<RoutePolicyRegistry>,
    pub audit_logs: AuditLogService,
    /// Task tracker for background audit writes.
    /// Ensures all spawned tasks complete during graceful shutdown.
    pub task_tracker: TaskTracker,
}

impl AppState {
    pub fn new(config: DocguardConfig, db: Arc<DbPool>) -> Result<Self, ConfigError> {
        let registry = config.route_registry()?;
        let engine = AuthzEngine::new(
            db.documents(),
            db.group_members(),
            db.document_permissions(),
        );

        Ok(Self {
            config: Arc::new(config),
            audit_logs: AuditLogService::new(Arc::clone(&db)),
            db,
            engine,
            registry: Arc::new(registry),
            task_tracker: TaskTracker::new(),
        })
    }
}

#[cfg(test)]
mod tests;

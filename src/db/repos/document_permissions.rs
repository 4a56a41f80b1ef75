use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{DocumentPermission, EntityType},
};

/// Read-only view of per-document ACL entries.
#[async_trait]
pub trait DocumentPermissionRepo: Send + Sync {
    /// Get the grant an entity holds on a document.
    ///
    /// Several rows may exist for the same (document, entity) pair, one per
    /// permission type. The strongest one is returned.
    async fn get_permission(
        &self,
        document_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> DbResult<Option<DocumentPermission>>;
}

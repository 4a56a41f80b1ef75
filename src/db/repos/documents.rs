use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::error::DbResult, models::DocumentAccess};

/// Read-only view of documents.
#[async_trait]
pub trait DocumentRepo: Send + Sync {
    /// Get the access-relevant fields of a document.
    ///
    /// Returns `Ok(None)` for unknown ids; errors are reserved for store failures.
    async fn get_access(&self, id: Uuid) -> DbResult<Option<DocumentAccess>>;
}

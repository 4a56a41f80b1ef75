use thiserror::Error;

/// Store failures.
///
/// A row that does not exist is not an error: repos return `Ok(None)` and
/// the engine turns that into a deny. Every variant here means the store
/// could not answer, which surfaces as a 500.
#[derive(Debug, Error)]
pub enum DbError {
    /// `DbPool::from_config` was handed `type = "none"`.
    #[error("Database not configured")]
    NotConfigured,

    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Audit details that failed to encode or decode.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value outside its domain (bad UUID, unknown role), or an
    /// unavailable in-memory store.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;

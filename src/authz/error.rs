//! Authorization errors.

use thiserror::Error;

use crate::db::DbError;

/// Failure to reach a verdict. A denial is never an error.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A store could not answer a lookup. Callers must surface this as a
    /// server error, never as an allow or a deny.
    #[error("Authorization lookup failed: {0}")]
    Lookup(#[from] DbError),
}

//! Error types for store operations.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// A duplicate domain URL is deliberately NOT an error: it is an expected,
/// named outcome reported as `Ok(false)` by [`crate::store::Store::add_domain`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

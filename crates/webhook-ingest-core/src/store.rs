//! Row store collaborator: an append-only tabular store.

use crate::{TableRef, WebhookRecord};
use async_trait::async_trait;

/// Errors returned by a [`RowStore`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (network failure, timeout)
    #[error("row store unavailable: {message}")]
    Unavailable { message: String },

    /// The store refused the whole request
    #[error("row store rejected insert ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request was accepted but individual rows failed
    #[error("row store reported row errors: {}", .errors.join("; "))]
    RowErrors { errors: Vec<String> },

    /// Credentials for the store could not be obtained
    #[error("row store authentication failed: {message}")]
    Authentication { message: String },
}

/// Appendable tabular data store.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Append one record to `table`
    async fn insert(&self, table: &TableRef, record: &WebhookRecord) -> Result<(), StoreError>;
}

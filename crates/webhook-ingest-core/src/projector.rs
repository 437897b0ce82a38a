//! # Record Projector
//!
//! Turns queued webhook messages into warehouse rows.
//!
//! A message that does not decode as a webhook payload is dropped: it is
//! logged and counted but never retried, since redelivery cannot fix it.
//! A failed insert is returned to the caller so the delivery framework can
//! redeliver the message under its own policy.

use crate::payload::{QueuedMessage, WebhookPayload, WebhookRecord};
use crate::store::{RowStore, StoreError};
use crate::TableRef;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "projector_tests.rs"]
mod tests;

/// Result of projecting one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The record was appended to the table
    Inserted(WebhookRecord),

    /// The message could not be decoded and was discarded
    Dropped { reason: String },
}

impl ProjectionOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Projection failures that the delivery framework should see
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("failed to insert row: {0}")]
    Insert(#[from] StoreError),
}

/// Snapshot of projector counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorStats {
    pub inserted: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    inserted: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Projects queued messages into [`WebhookRecord`]s and appends them to a table.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use webhook_ingest_core::adapters::InMemoryRowStore;
/// use webhook_ingest_core::{QueuedMessage, RecordProjector, TableRef};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryRowStore::new();
/// let table = TableRef::new("my-project", "webhooks", "events").unwrap();
/// let projector = RecordProjector::new(Arc::new(store.clone()), table.clone());
///
/// let message = QueuedMessage::new(r#"{"eventType":"message.sent","data":{"id":1}}"#);
/// let outcome = projector.project(&message).await.unwrap();
///
/// assert!(outcome.is_inserted());
/// assert_eq!(store.rows_in(&table).await[0].raw_data_str(), Some(r#"{"id":1}"#));
/// # });
/// ```
#[derive(Clone)]
pub struct RecordProjector {
    store: Arc<dyn RowStore>,
    table: TableRef,
    counters: Arc<Counters>,
}

impl RecordProjector {
    pub fn new(store: Arc<dyn RowStore>, table: TableRef) -> Self {
        Self {
            store,
            table,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Target table for inserted records
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Decode one message and append the resulting record.
    ///
    /// # Returns
    ///
    /// - `Ok(Inserted)` once the store acknowledged the row
    /// - `Ok(Dropped)` if the body is not a webhook payload
    /// - `Err(ProjectionError::Insert)` if the store failed
    pub async fn project(
        &self,
        message: &QueuedMessage,
    ) -> Result<ProjectionOutcome, ProjectionError> {
        let message_id = message.id().map(|id| id.as_str()).unwrap_or("-");

        let payload = match WebhookPayload::from_slice(message.body()) {
            Ok(payload) => payload,
            Err(e) => return Ok(self.drop_message(message_id, e.to_string())),
        };

        let record = WebhookRecord::from_payload(payload);

        if let Err(e) = self.store.insert(&self.table, &record).await {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            error!(
                message_id = %message_id,
                table = %self.table,
                error = %e,
                "Failed to insert webhook record"
            );
            return Err(ProjectionError::Insert(e));
        }

        self.counters.inserted.fetch_add(1, Ordering::Relaxed);
        info!(
            message_id = %message_id,
            event_type = %record.event_type,
            table = %self.table,
            "Inserted webhook record"
        );

        Ok(ProjectionOutcome::Inserted(record))
    }

    /// Record a message that never reached decoding (e.g. a broken delivery
    /// envelope) as dropped.
    pub fn drop_undeliverable(&self, reason: impl Into<String>) -> ProjectionOutcome {
        self.drop_message("-", reason.into())
    }

    fn drop_message(&self, message_id: &str, reason: String) -> ProjectionOutcome {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            message_id = %message_id,
            reason = %reason,
            "Dropping undecodable webhook message"
        );
        ProjectionOutcome::Dropped { reason }
    }

    pub fn stats(&self) -> ProjectorStats {
        ProjectorStats {
            inserted: self.counters.inserted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

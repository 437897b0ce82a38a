//! # In-Memory Sink and Store
//!
//! Thread-safe in-memory implementations of [`MessageSink`] and [`RowStore`].
//! Both keep what they receive, optionally only the newest `capacity`
//! entries, and can be switched into a failing mode to exercise error paths.

use crate::payload::{QueuedMessage, WebhookRecord};
use crate::sink::{MessageSink, SinkError};
use crate::store::{RowStore, StoreError};
use crate::{MessageId, TableRef, TopicName};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Message Sink
// ============================================================================

/// A message accepted by [`InMemoryMessageSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub id: MessageId,
    pub topic: TopicName,
    pub body: Bytes,
}

#[derive(Default)]
struct SinkState {
    published: VecDeque<PublishedMessage>,
    capacity: Option<usize>,
    failure: Option<SinkError>,
}

/// In-memory message sink that records every publish.
#[derive(Clone, Default)]
pub struct InMemoryMessageSink {
    state: Arc<Mutex<SinkState>>,
}

impl InMemoryMessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that keeps only the newest `capacity` messages
    pub fn bounded(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                capacity: Some(capacity.max(1)),
                ..SinkState::default()
            })),
        }
    }

    /// Make every following publish fail with `error`
    pub async fn fail_with(&self, error: SinkError) {
        self.state.lock().await.failure = Some(error);
    }

    /// Clear a failure set by [`fail_with`](Self::fail_with)
    pub async fn recover(&self) {
        self.state.lock().await.failure = None;
    }

    /// All messages published so far, oldest first
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.published.iter().cloned().collect()
    }

    pub async fn publish_count(&self) -> usize {
        self.state.lock().await.published.len()
    }

    /// Remove all published messages and hand them out as queued messages
    pub async fn drain(&self) -> Vec<QueuedMessage> {
        let mut state = self.state.lock().await;
        state
            .published
            .drain(..)
            .map(|m| QueuedMessage::with_id(m.id, m.body))
            .collect()
    }
}

#[async_trait]
impl MessageSink for InMemoryMessageSink {
    async fn publish(&self, topic: &TopicName, body: Bytes) -> Result<MessageId, SinkError> {
        let mut state = self.state.lock().await;
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }

        let id = MessageId::generate();
        if state.capacity.is_some_and(|max| state.published.len() >= max) {
            state.published.pop_front();
        }
        state.published.push_back(PublishedMessage {
            id: id.clone(),
            topic: topic.clone(),
            body,
        });
        Ok(id)
    }
}

// ============================================================================
// Row Store
// ============================================================================

/// A record accepted by [`InMemoryRowStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub table: TableRef,
    pub record: WebhookRecord,
}

#[derive(Default)]
struct StoreState {
    rows: VecDeque<StoredRow>,
    capacity: Option<usize>,
    failure: Option<StoreError>,
}

/// In-memory append-only row store.
#[derive(Clone, Default)]
pub struct InMemoryRowStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that keeps only the newest `capacity` rows
    pub fn bounded(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                capacity: Some(capacity.max(1)),
                ..StoreState::default()
            })),
        }
    }

    /// Make every following insert fail with `error`
    pub async fn fail_with(&self, error: StoreError) {
        self.state.lock().await.failure = Some(error);
    }

    pub async fn recover(&self) {
        self.state.lock().await.failure = None;
    }

    /// All rows inserted so far, oldest first
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.state.lock().await.rows.iter().cloned().collect()
    }

    /// Rows inserted into one table
    pub async fn rows_in(&self, table: &TableRef) -> Vec<WebhookRecord> {
        self.state
            .lock()
            .await
            .rows
            .iter()
            .filter(|row| &row.table == table)
            .map(|row| row.record.clone())
            .collect()
    }
}

#[async_trait]
impl RowStore for InMemoryRowStore {
    async fn insert(&self, table: &TableRef, record: &WebhookRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }

        if state.capacity.is_some_and(|max| state.rows.len() >= max) {
            state.rows.pop_front();
        }
        state.rows.push_back(StoredRow {
            table: table.clone(),
            record: record.clone(),
        });
        Ok(())
    }
}

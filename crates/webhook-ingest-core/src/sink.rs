//! Message sink collaborator: a durable publish/subscribe channel.

use crate::{MessageId, TopicName};
use async_trait::async_trait;
use bytes::Bytes;

/// Errors returned by a [`MessageSink`]
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// The sink could not be reached (network failure, timeout)
    #[error("message sink unavailable: {message}")]
    Unavailable { message: String },

    /// The sink answered but refused the message
    #[error("message sink rejected publish ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The sink accepted the request but its reply could not be understood
    #[error("invalid response from message sink: {message}")]
    InvalidResponse { message: String },

    /// Credentials for the sink could not be obtained
    #[error("message sink authentication failed: {message}")]
    Authentication { message: String },
}

impl SinkError {
    /// Check if the failure is worth retrying by the caller
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse { .. } => false,
            Self::Authentication { .. } => false,
        }
    }
}

/// Publish/subscribe channel accepting raw bytes.
///
/// Delivery to subscribers is at-least-once with no ordering guarantee.
/// Implementations are shared by concurrent requests and must not require
/// exclusive access.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Publish `body` unchanged to `topic`, returning the sink-assigned ID
    async fn publish(&self, topic: &TopicName, body: Bytes) -> Result<MessageId, SinkError>;
}

//! Pub/Sub message sink.

use crate::{normalize_endpoint, post_json, TokenProvider};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use webhook_ingest_core::{MessageId, MessageSink, ProjectId, SinkError, TopicName};

#[cfg(test)]
#[path = "pubsub_tests.rs"]
mod tests;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes raw message bodies through the Pub/Sub `topics.publish` API.
///
/// The body is base64-encoded into the `data` field exactly as received; no
/// attributes are attached.
pub struct PubSubSink {
    http: reqwest::Client,
    endpoint: String,
    project: ProjectId,
    tokens: Arc<dyn TokenProvider>,
}

impl PubSubSink {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        project: ProjectId,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: normalize_endpoint(endpoint),
            project,
            tokens,
        }
    }

    fn publish_url(&self, topic: &TopicName) -> String {
        format!(
            "{}/v1/projects/{}/topics/{}:publish",
            self.endpoint, self.project, topic
        )
    }
}

#[async_trait]
impl MessageSink for PubSubSink {
    async fn publish(&self, topic: &TopicName, body: Bytes) -> Result<MessageId, SinkError> {
        let request = serde_json::json!({
            "messages": [{ "data": STANDARD.encode(&body) }]
        });

        let response: PublishResponse =
            post_json(&self.http, self.tokens.as_ref(), &self.publish_url(topic), &request)
                .await
                .map_err(|e| e.into_sink_error())?;

        let id = response
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| SinkError::InvalidResponse {
                message: "publish response contained no message IDs".to_string(),
            })?;

        let id = MessageId::new(id).map_err(|e| SinkError::InvalidResponse {
            message: e.to_string(),
        })?;

        debug!(topic = %topic, message_id = %id, bytes = body.len(), "Published message");
        Ok(id)
    }
}

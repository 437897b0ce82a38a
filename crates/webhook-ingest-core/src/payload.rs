//! Webhook payload, queued message and warehouse record types.

use crate::MessageId;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;

/// Check that `body` is one syntactically valid JSON value.
///
/// Any JSON value passes (objects, arrays, scalars); no field presence or type
/// checks are made. Empty input is not valid JSON.
pub fn validate_json_syntax(body: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<serde::de::IgnoredAny>(body).map(|_| ())
}

/// Inbound webhook notification as produced by the external sender.
///
/// The receiver never builds this type; only the projector decodes it. Missing
/// or `null` `eventType` and `timestamp` decode as empty strings, and a missing
/// or `null` `data` decodes as `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "eventType", default, deserialize_with = "null_as_empty")]
    pub event_type: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub timestamp: String,

    /// Untouched source text of the `data` field
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl WebhookPayload {
    /// Decode a payload from raw message bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Message as delivered by the message sink to the processor.
///
/// The body is the exact byte sequence received by the webhook intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    id: Option<MessageId>,
    body: Bytes,
}

impl QueuedMessage {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            id: None,
            body: body.into(),
        }
    }

    pub fn with_id(id: MessageId, body: impl Into<Bytes>) -> Self {
        Self {
            id: Some(id),
            body: body.into(),
        }
    }

    pub fn id(&self) -> Option<&MessageId> {
        self.id.as_ref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Row appended to the warehouse table, one per queued message.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRecord {
    pub event_type: String,
    pub event_timestamp: String,
    pub raw_data: Option<Box<RawValue>>,
}

impl WebhookRecord {
    /// Project a decoded payload into the three-column record shape
    pub fn from_payload(payload: WebhookPayload) -> Self {
        Self {
            event_type: payload.event_type,
            event_timestamp: payload.timestamp,
            raw_data: payload.data,
        }
    }

    /// Source text of the `data` field, if one was present
    pub fn raw_data_str(&self) -> Option<&str> {
        self.raw_data.as_deref().map(RawValue::get)
    }
}

impl PartialEq for WebhookRecord {
    fn eq(&self, other: &Self) -> bool {
        self.event_type == other.event_type
            && self.event_timestamp == other.event_timestamp
            && self.raw_data_str() == other.raw_data_str()
    }
}

impl Eq for WebhookRecord {}

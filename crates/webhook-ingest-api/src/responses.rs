//! Response bodies and the Pub/Sub push envelope.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status reply: `{"status": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    /// Reply for an accepted webhook
    pub fn success() -> Self {
        Self::new("sucesso")
    }

    pub fn inserted() -> Self {
        Self::new("inserted")
    }

    pub fn dropped() -> Self {
        Self::new("dropped")
    }

    pub fn healthy() -> Self {
        Self::new("ok")
    }

    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

/// Error reply: `{"error": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body Pub/Sub POSTs to a push subscription endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,

    #[serde(default)]
    pub subscription: Option<String>,
}

/// One delivered Pub/Sub message
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64 of the published bytes; absent for attribute-only messages
    #[serde(default)]
    pub data: Option<String>,

    #[serde(default)]
    pub message_id: Option<String>,

    #[serde(default)]
    pub publish_time: Option<String>,

    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

//! # Webhook Ingest GCP Backends
//!
//! Google Cloud implementations of the webhook-ingest collaborators, built on
//! the plain REST APIs:
//!
//! - [`PubSubSink`] publishes raw webhook bodies to a Pub/Sub topic
//! - [`BigQueryRowStore`] streams webhook records into a BigQuery table
//! - [`auth`] supplies OAuth access tokens (metadata server, static, or none
//!   for emulators)
//!
//! Talking HTTP directly keeps the backends testable against a mock server
//! and avoids pulling a full cloud SDK into the service.

pub mod auth;
pub mod bigquery;
pub mod pubsub;

pub use auth::{
    AccessToken, MetadataTokenProvider, NoAuthTokenProvider, StaticTokenProvider, TokenError,
    TokenProvider,
};
pub use bigquery::BigQueryRowStore;
pub use pubsub::PubSubSink;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use webhook_ingest_core::{SinkError, StoreError};

/// Public Pub/Sub REST endpoint
pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Public BigQuery REST endpoint
pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// Error Types
// ============================================================================

/// Failures talking to a Google Cloud REST API
#[derive(Debug, thiserror::Error)]
pub enum GcpError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("could not obtain access token: {0}")]
    Token(#[from] TokenError),
}

impl GcpError {
    /// Map to the message sink error taxonomy
    pub fn into_sink_error(self) -> SinkError {
        match self {
            Self::Transport(message) => SinkError::Unavailable { message },
            Self::Status { status, message } => SinkError::Rejected { status, message },
            Self::Decode(message) => SinkError::InvalidResponse { message },
            Self::Token(e) => SinkError::Authentication {
                message: e.to_string(),
            },
        }
    }

    /// Map to the row store error taxonomy
    pub fn into_store_error(self) -> StoreError {
        match self {
            Self::Transport(message) => StoreError::Unavailable { message },
            Self::Status { status, message } => StoreError::Rejected { status, message },
            Self::Decode(message) => StoreError::Unavailable {
                message: format!("undecodable response: {message}"),
            },
            Self::Token(e) => StoreError::Authentication {
                message: e.to_string(),
            },
        }
    }
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Build the shared HTTP client used by all backends.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, GcpError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("webhook-ingest/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GcpError::Transport(e.to_string()))
}

/// Normalize an endpoint setting into a base URL without a trailing slash.
///
/// Emulator hosts are usually given as `host:port`; those get an `http://`
/// scheme.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the human-readable message out of a Google API error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// POST a JSON body with an optional bearer token and decode the JSON reply.
async fn post_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    tokens: &dyn TokenProvider,
    url: &str,
    body: &serde_json::Value,
) -> Result<T, GcpError> {
    let mut request = http.post(url).json(body);
    if let Some(token) = tokens.access_token().await? {
        request = request.bearer_auth(token.secret());
    }

    let response = request
        .send()
        .await
        .map_err(|e| GcpError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GcpError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(GcpError::Status {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }

    serde_json::from_str(&text).map_err(|e| GcpError::Decode(e.to_string()))
}

//! OAuth access tokens for Google Cloud REST calls.
//!
//! Three providers cover the deployment shapes the service runs in:
//!
//! - [`MetadataTokenProvider`] fetches tokens for the attached service account
//!   from the metadata server (Cloud Run, Cloud Functions, GCE) and caches
//!   them until shortly before expiry
//! - [`StaticTokenProvider`] uses a token supplied through configuration
//! - [`NoAuthTokenProvider`] sends no credentials, for local emulators

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

/// Default token endpoint of the metadata server
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECONDS: i64 = 60;

/// Errors obtaining an access token
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("token endpoint returned HTTP {status}")]
    Rejected { status: u16 },

    #[error("token response could not be decoded: {0}")]
    Decode(String),
}

/// Bearer token with its expiry
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Raw token value for the `Authorization` header
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True if the token expires within the refresh margin
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(REFRESH_MARGIN_SECONDS) >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of bearer tokens for outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Token to attach, or `None` to send the request unauthenticated
    async fn access_token(&self) -> Result<Option<AccessToken>, TokenError>;
}

/// Sends requests without credentials (emulators).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthTokenProvider;

#[async_trait]
impl TokenProvider for NoAuthTokenProvider {
    async fn access_token(&self) -> Result<Option<AccessToken>, TokenError> {
        Ok(None)
    }
}

/// Uses one fixed token for every request.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(value, DateTime::<Utc>::MAX_UTC),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<Option<AccessToken>, TokenError> {
        Ok(Some(self.token.clone()))
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Fetches service account tokens from the metadata server.
pub struct MetadataTokenProvider {
    http: reqwest::Client,
    token_url: String,
    cached: RwLock<Option<AccessToken>>,
}

impl MetadataTokenProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_token_url(http, METADATA_TOKEN_URL)
    }

    pub fn with_token_url(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<AccessToken, TokenError> {
        let response = self
            .http
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| TokenError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError::Decode(e.to_string()))?;

        debug!(expires_in = body.expires_in, "Fetched access token from metadata server");

        let expires_at = Duration::try_seconds(body.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                TokenError::Decode(format!("expires_in out of range: {}", body.expires_in))
            })?;

        Ok(AccessToken::new(body.access_token, expires_at))
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn access_token(&self) -> Result<Option<AccessToken>, TokenError> {
        if let Some(token) = self.cached.read().await.as_ref() {
            if !token.needs_refresh() {
                return Ok(Some(token.clone()));
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(Some(token.clone()));
            }
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(Some(token))
    }
}

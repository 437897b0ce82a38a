//! Tests for access token providers.

use super::*;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

fn provider_for(server: &MockServer) -> MetadataTokenProvider {
    MetadataTokenProvider::with_token_url(
        reqwest::Client::new(),
        format!("{}{}", server.uri(), TOKEN_PATH),
    )
}

#[tokio::test]
async fn test_no_auth_provider_returns_none() {
    assert!(NoAuthTokenProvider.access_token().await.unwrap().is_none());
}

#[tokio::test]
async fn test_static_provider_returns_configured_token() {
    let provider = StaticTokenProvider::new("ya29.static");

    let token = provider.access_token().await.unwrap().unwrap();

    assert_eq!(token.secret(), "ya29.static");
    assert!(!token.needs_refresh());
}

#[test]
fn test_debug_output_redacts_token() {
    let token = AccessToken::new("ya29.very-secret", Utc::now());
    let debug = format!("{token:?}");
    assert!(!debug.contains("very-secret"), "leaked token: {debug}");
    assert!(debug.contains("REDACTED"));
}

#[test]
fn test_token_close_to_expiry_needs_refresh() {
    let token = AccessToken::new("t", Utc::now() + Duration::seconds(30));
    assert!(token.needs_refresh());

    let token = AccessToken::new("t", Utc::now() + Duration::seconds(3600));
    assert!(!token.needs_refresh());
}

#[tokio::test]
async fn test_metadata_provider_fetches_with_flavor_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.from-metadata",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let token = provider_for(&server).access_token().await.unwrap().unwrap();

    assert_eq!(token.secret(), "ya29.from-metadata");
}

/// A fresh token is served from cache; the metadata server is hit once.
#[tokio::test]
async fn test_metadata_provider_caches_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.cached",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    provider.access_token().await.unwrap();
    let second = provider.access_token().await.unwrap().unwrap();

    assert_eq!(second.secret(), "ya29.cached");
}

/// Tokens inside the refresh margin are fetched again.
#[tokio::test]
async fn test_metadata_provider_refreshes_expiring_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.short-lived",
            "expires_in": 10
        })))
        .expect(2)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();
}

#[tokio::test]
async fn test_metadata_provider_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = provider_for(&server).access_token().await;

    assert!(matches!(result, Err(TokenError::Rejected { status: 404 })));
}

#[tokio::test]
async fn test_metadata_provider_reports_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = provider_for(&server).access_token().await;

    assert!(matches!(result, Err(TokenError::Decode(_))));
}

#[tokio::test]
async fn test_metadata_provider_rejects_out_of_range_lifetime() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.forever",
            "expires_in": i64::MAX,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let result = provider_for(&server).access_token().await;

    assert!(matches!(result, Err(TokenError::Decode(message)) if message.contains("expires_in")));
}

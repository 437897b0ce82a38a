//! Error types for the HTTP services

use crate::responses::ErrorResponse;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use webhook_ingest_core::{ProjectionError, SinkError, ValidationError};

/// Body of every 405 reply
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Método não permitido";

/// Body of every 400 reply for unparseable input
pub const INVALID_JSON_MESSAGE: &str = "invalid JSON body";

/// Webhook intake errors with HTTP status code mapping
///
/// Every variant terminates the request; none is retried internally. The
/// reply body is always `{"error": "<Display of the variant>"}`.
///
/// - `405 Method Not Allowed`: anything but POST, body never read
/// - `400 Bad Request`: body is not syntactically valid JSON
/// - `413 Payload Too Large`: body exceeds the configured limit
/// - `500 Internal Server Error`: body read or publish failed
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("{}", METHOD_NOT_ALLOWED_MESSAGE)]
    MethodNotAllowed { method: String },

    #[error("failed to read request body: {message}")]
    BodyRead { message: String },

    #[error("request body exceeds {max_size} bytes")]
    PayloadTooLarge { max_size: usize },

    #[error("{}", INVALID_JSON_MESSAGE)]
    InvalidJson,

    #[error("failed to publish message: {0}")]
    Publish(#[from] SinkError),
}

impl IntakeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BodyRead { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidJson => StatusCode::BAD_REQUEST,
            Self::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the request outcome metric
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::BodyRead { .. } => "read_failed",
            Self::PayloadTooLarge { .. } => "too_large",
            Self::InvalidJson => "invalid_json",
            Self::Publish(_) => "publish_failed",
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let allow_post = matches!(self, Self::MethodNotAllowed { .. });

        let mut response = (status, Json(ErrorResponse::new(self.to_string()))).into_response();
        if allow_post {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

/// Push delivery errors
///
/// Only failures that a redelivery could fix are reported as errors; broken
/// envelopes are acknowledged and dropped by the handler instead.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("{}", METHOD_NOT_ALLOWED_MESSAGE)]
    MethodNotAllowed { method: String },

    #[error("failed to read request body: {message}")]
    BodyRead { message: String },

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl PushError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::BodyRead { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PushError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let allow_post = matches!(self, Self::MethodNotAllowed { .. });

        let mut response = (status, Json(ErrorResponse::new(self.to_string()))).into_response();
        if allow_post {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to initialize metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },

    #[error("Invalid configuration value: {0}")]
    Validation(#[from] ValidationError),
}

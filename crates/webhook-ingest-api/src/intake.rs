//! # Webhook Intake
//!
//! Accepts webhook notifications on `/`, checks that the body is one
//! syntactically valid JSON value and publishes the untouched body to the
//! message sink before answering.
//!
//! Only syntax is validated: a body that is valid JSON but not a webhook
//! payload is still forwarded, and the projector decides what to do with it.

use crate::errors::IntakeError;
use crate::metrics::ServiceMetrics;
use crate::responses::StatusResponse;
use axum::{
    body::Body,
    extract::{FromRef, Request, State},
    http::Method,
    response::Json,
};
use bytes::Bytes;
use http_body_util::LengthLimitError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use webhook_ingest_core::{payload::validate_json_syntax, MessageSink, TopicName};

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;

/// Shared state of the receiver service
#[derive(Clone)]
pub struct ReceiverState {
    /// Long-lived sink client shared by all requests
    pub sink: Arc<dyn MessageSink>,

    pub topic: TopicName,

    /// Bodies larger than this are rejected with 413
    pub max_body_size: usize,

    pub metrics: Arc<ServiceMetrics>,
}

impl ReceiverState {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        topic: TopicName,
        max_body_size: usize,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            sink,
            topic,
            max_body_size,
            metrics,
        }
    }
}

impl FromRef<ReceiverState> for Arc<ServiceMetrics> {
    fn from_ref(state: &ReceiverState) -> Self {
        state.metrics.clone()
    }
}

/// Handle one webhook request.
///
/// Exactly one publish happens per valid POST, and the reply is sent only
/// after the sink acknowledged it.
pub async fn handle_webhook(
    State(state): State<ReceiverState>,
    request: Request,
) -> Result<Json<StatusResponse>, IntakeError> {
    let result = accept_webhook(&state, request).await;

    let outcome = match &result {
        Ok(_) => "accepted",
        Err(e) => e.outcome(),
    };
    state.metrics.record_intake(outcome);

    result.map(|_| Json(StatusResponse::success()))
}

async fn accept_webhook(state: &ReceiverState, request: Request) -> Result<(), IntakeError> {
    if request.method() != Method::POST {
        warn!(method = %request.method(), "Rejected webhook with unsupported method");
        return Err(IntakeError::MethodNotAllowed {
            method: request.method().to_string(),
        });
    }

    let body = read_body(request.into_body(), state.max_body_size).await?;

    if let Err(e) = validate_json_syntax(&body) {
        warn!(bytes = body.len(), error = %e, "Rejected webhook with invalid JSON body");
        return Err(IntakeError::InvalidJson);
    }

    let size = body.len();
    let started = Instant::now();
    let published = state.sink.publish(&state.topic, body).await;
    state
        .metrics
        .publish_duration_seconds
        .observe(started.elapsed().as_secs_f64());

    match published {
        Ok(message_id) => {
            state.metrics.webhook_body_bytes.observe(size as f64);
            info!(
                topic = %state.topic,
                message_id = %message_id,
                bytes = size,
                "Webhook received and published"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                topic = %state.topic,
                transient = e.is_transient(),
                error = %e,
                "Failed to publish webhook"
            );
            Err(IntakeError::Publish(e))
        }
    }
}

/// Read the whole body, enforcing `limit`.
pub(crate) async fn read_body(body: Body, limit: usize) -> Result<Bytes, IntakeError> {
    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            let cause = e.into_inner();
            if cause.is::<LengthLimitError>() {
                warn!(max_size = limit, "Rejected webhook body over size limit");
                Err(IntakeError::PayloadTooLarge { max_size: limit })
            } else {
                error!(error = %cause, "Failed to read webhook body");
                Err(IntakeError::BodyRead {
                    message: cause.to_string(),
                })
            }
        }
    }
}

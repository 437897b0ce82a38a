//! # Push Delivery
//!
//! Endpoint of the processor service. Pub/Sub POSTs one envelope per queued
//! message; the handler unwraps it and hands the original webhook body to the
//! [`RecordProjector`].
//!
//! The status code is the acknowledgment: any 2xx acks the message, anything
//! else makes the subscription redeliver it. Messages that can never be
//! decoded are acked so they do not loop forever.

use crate::errors::{IntakeError, PushError};
use crate::intake::read_body;
use crate::metrics::ServiceMetrics;
use crate::responses::{PushEnvelope, StatusResponse};
use axum::{
    extract::{FromRef, Request, State},
    http::Method,
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::warn;
use webhook_ingest_core::{MessageId, ProjectionOutcome, QueuedMessage, RecordProjector};

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;

/// Shared state of the processor service
#[derive(Clone)]
pub struct ProcessorState {
    pub projector: RecordProjector,

    /// Upper bound for the decoded webhook body; the envelope may be up to
    /// twice as large to leave room for base64 and metadata.
    pub max_body_size: usize,

    pub metrics: Arc<ServiceMetrics>,
}

impl ProcessorState {
    pub fn new(
        projector: RecordProjector,
        max_body_size: usize,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            projector,
            max_body_size,
            metrics,
        }
    }

    fn envelope_limit(&self) -> usize {
        self.max_body_size.saturating_mul(2)
    }
}

impl FromRef<ProcessorState> for Arc<ServiceMetrics> {
    fn from_ref(state: &ProcessorState) -> Self {
        state.metrics.clone()
    }
}

/// Handle one push delivery.
pub async fn handle_push(
    State(state): State<ProcessorState>,
    request: Request,
) -> Result<Json<StatusResponse>, PushError> {
    if request.method() != Method::POST {
        warn!(method = %request.method(), "Rejected push delivery with unsupported method");
        return Err(PushError::MethodNotAllowed {
            method: request.method().to_string(),
        });
    }

    // An envelope over the limit stays over it on every redelivery.
    let body = match read_body(request.into_body(), state.envelope_limit()).await {
        Ok(body) => body,
        Err(e @ IntakeError::PayloadTooLarge { .. }) => {
            return Ok(drop_delivery(&state, format!("push envelope {}", e)));
        }
        Err(e) => {
            return Err(PushError::BodyRead {
                message: e.to_string(),
            })
        }
    };

    let message = match unwrap_envelope(&body) {
        Ok(message) => message,
        Err(reason) => return Ok(drop_delivery(&state, reason)),
    };

    match state.projector.project(&message).await {
        Ok(ProjectionOutcome::Inserted(_)) => {
            state.metrics.record_projection("inserted");
            Ok(Json(StatusResponse::inserted()))
        }
        Ok(ProjectionOutcome::Dropped { .. }) => {
            state.metrics.record_projection("dropped");
            Ok(Json(StatusResponse::dropped()))
        }
        Err(e) => {
            state.metrics.record_projection("insert_failed");
            Err(PushError::Projection(e))
        }
    }
}

fn drop_delivery(state: &ProcessorState, reason: String) -> Json<StatusResponse> {
    state.projector.drop_undeliverable(reason);
    state.metrics.record_projection("dropped");
    Json(StatusResponse::dropped())
}

/// Decode a push envelope into the message that was originally published.
fn unwrap_envelope(body: &[u8]) -> Result<QueuedMessage, String> {
    let envelope: PushEnvelope =
        serde_json::from_slice(body).map_err(|e| format!("invalid push envelope: {}", e))?;

    let data = envelope
        .message
        .data
        .ok_or_else(|| "push message has no data".to_string())?;
    let decoded = STANDARD
        .decode(data.as_bytes())
        .map_err(|e| format!("invalid base64 message data: {}", e))?;

    let message = match envelope
        .message
        .message_id
        .and_then(|id| MessageId::new(id).ok())
    {
        Some(id) => QueuedMessage::with_id(id, decoded),
        None => QueuedMessage::new(decoded),
    };
    Ok(message)
}

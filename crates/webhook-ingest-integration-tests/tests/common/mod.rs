//! Common test utilities for webhook-ingest integration tests
//!
//! This module provides:
//! - A two-stage [`Pipeline`] wired with in-memory sink and store
//! - Helpers for sending requests through a router
//! - Push envelope builders matching what Pub/Sub delivers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use webhook_ingest_api::{
    processor_router, receiver_router, ProcessorState, ReceiverState, ServerConfig,
    ServiceMetrics,
};
use webhook_ingest_core::{
    adapters::{InMemoryMessageSink, InMemoryRowStore},
    QueuedMessage, RecordProjector, TableRef, TopicName,
};

/// The webhook used throughout the scenarios
#[allow(dead_code)]
pub const SAMPLE_WEBHOOK: &str =
    r#"{"eventType":"message.sent","timestamp":"2025-08-29T10:00:00Z","data":{"contactId":"123"}}"#;

pub fn topic() -> TopicName {
    TopicName::new("webhook-events").unwrap()
}

pub fn table() -> TableRef {
    TableRef::new("acme-prod", "webhooks", "raw_events").unwrap()
}

// ============================================================================
// Pipeline
// ============================================================================

/// Receiver and processor connected through an in-memory queue
#[allow(dead_code)]
pub struct Pipeline {
    pub receiver: Router,
    pub processor: Router,
    pub sink: InMemoryMessageSink,
    pub store: InMemoryRowStore,
    pub projector: RecordProjector,
    pub receiver_metrics: Arc<ServiceMetrics>,
    pub processor_metrics: Arc<ServiceMetrics>,
}

#[allow(dead_code)]
impl Pipeline {
    pub fn new() -> Self {
        Self::with_server(ServerConfig::default())
    }

    pub fn with_server(server: ServerConfig) -> Self {
        let sink = InMemoryMessageSink::new();
        let store = InMemoryRowStore::new();
        let projector = RecordProjector::new(Arc::new(store.clone()), table());
        let receiver_metrics = ServiceMetrics::new().unwrap();
        let processor_metrics = ServiceMetrics::new().unwrap();

        let receiver = receiver_router(
            ReceiverState::new(
                Arc::new(sink.clone()),
                topic(),
                server.max_body_size,
                receiver_metrics.clone(),
            ),
            &server,
        );
        let processor = processor_router(
            ProcessorState::new(
                projector.clone(),
                server.max_body_size,
                processor_metrics.clone(),
            ),
            &server,
        );

        Self {
            receiver,
            processor,
            sink,
            store,
            projector,
            receiver_metrics,
            processor_metrics,
        }
    }

    /// POST a webhook body to the receiver
    pub async fn post_webhook(&self, body: &str) -> (StatusCode, Value) {
        send(&self.receiver, "POST", body.to_string()).await
    }

    /// Push every queued message to the processor, in publish order
    pub async fn deliver_pending(&self) -> Vec<(StatusCode, Value)> {
        let mut responses = Vec::new();
        for message in self.sink.drain().await {
            responses.push(self.deliver(&message).await);
        }
        responses
    }

    /// Push one message to the processor
    pub async fn deliver(&self, message: &QueuedMessage) -> (StatusCode, Value) {
        send(&self.processor, "POST", push_envelope(message)).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Build the JSON body Pub/Sub POSTs to a push endpoint
#[allow(dead_code)]
pub fn push_envelope(message: &QueuedMessage) -> String {
    let id = message
        .id()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| "0".to_string());

    json!({
        "message": {
            "data": STANDARD.encode(message.body()),
            "messageId": id,
            "publishTime": "2025-08-29T10:00:01.000Z"
        },
        "subscription": "projects/acme-prod/subscriptions/webhook-events-push"
    })
    .to_string()
}

/// Send a request to `/` and decode the JSON reply
pub async fn send(router: &Router, method: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, serde_json::from_slice(&bytes).unwrap())
}

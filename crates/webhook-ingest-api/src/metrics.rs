//! Metrics collection for the receiver and processor services.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;

/// Service metrics for observability
///
/// Each instance owns its own [`Registry`], so several instances (one per
/// test, or receiver and processor in one process) never collide.
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Intake requests by outcome (`accepted`, `invalid_json`, ...)
    pub webhook_requests_total: IntCounterVec,

    /// Size of accepted webhook bodies
    pub webhook_body_bytes: Histogram,

    /// Time spent waiting for publish acknowledgment
    pub publish_duration_seconds: Histogram,

    /// Push deliveries by outcome (`inserted`, `dropped`, `insert_failed`)
    pub projector_messages_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let webhook_requests_total = IntCounterVec::new(
            Opts::new("webhook_requests_total", "Webhook intake requests by outcome"),
            &["outcome"],
        )?;
        let webhook_body_bytes = Histogram::with_opts(
            HistogramOpts::new("webhook_body_bytes", "Accepted webhook body size in bytes")
                .buckets(vec![100.0, 1000.0, 10000.0, 100000.0, 1000000.0, 10000000.0]),
        )?;
        let publish_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "webhook_publish_duration_seconds",
                "Time to receive publish acknowledgment",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        let projector_messages_total = IntCounterVec::new(
            Opts::new(
                "projector_messages_total",
                "Queued messages handled by the projector by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(webhook_requests_total.clone()))?;
        registry.register(Box::new(webhook_body_bytes.clone()))?;
        registry.register(Box::new(publish_duration_seconds.clone()))?;
        registry.register(Box::new(projector_messages_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            webhook_requests_total,
            webhook_body_bytes,
            publish_duration_seconds,
            projector_messages_total,
        }))
    }

    pub fn record_intake(&self, outcome: &str) {
        self.webhook_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_projection(&self, outcome: &str) {
        self.projector_messages_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Current value of one intake outcome counter
    pub fn intake_count(&self, outcome: &str) -> u64 {
        self.webhook_requests_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Current value of one projection outcome counter
    pub fn projection_count(&self, outcome: &str) -> u64 {
        self.projector_messages_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

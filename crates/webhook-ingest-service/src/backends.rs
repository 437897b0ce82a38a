//! Construction of the message sink and row store from configuration.
//!
//! Clients are built once at startup and shared by every request.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use webhook_ingest_api::{Backend, GcpConfig, ProcessorSettings, ReceiverSettings};
use webhook_ingest_core::{
    adapters::{InMemoryMessageSink, InMemoryRowStore},
    MessageSink, RowStore,
};
use webhook_ingest_gcp::{
    http_client, BigQueryRowStore, GcpError, MetadataTokenProvider, NoAuthTokenProvider,
    PubSubSink, StaticTokenProvider, TokenProvider,
};

#[cfg(test)]
#[path = "backends_tests.rs"]
mod tests;

/// Entries the in-memory backend keeps before evicting the oldest
pub const MEMORY_BACKEND_CAPACITY: usize = 10_000;

/// Build the sink the receiver publishes to.
///
/// With `pubsub_emulator_host` set, messages go to the emulator without
/// credentials.
pub fn build_sink(
    config: &GcpConfig,
    settings: &ReceiverSettings,
) -> Result<Arc<dyn MessageSink>, GcpError> {
    match config.backend {
        Backend::Memory => {
            warn!(
                capacity = MEMORY_BACKEND_CAPACITY,
                "Using in-memory message sink; published messages stay in this process and the oldest are evicted past capacity"
            );
            Ok(Arc::new(InMemoryMessageSink::bounded(MEMORY_BACKEND_CAPACITY)))
        }
        Backend::Gcp => {
            let http = http_client(Duration::from_secs(config.request_timeout_seconds))?;

            let (endpoint, tokens): (&str, Arc<dyn TokenProvider>) =
                match emulator_host(config) {
                    Some(host) => {
                        info!(host = %host, "Publishing to Pub/Sub emulator");
                        (host, Arc::new(NoAuthTokenProvider) as Arc<dyn TokenProvider>)
                    }
                    None => (config.pubsub_endpoint.as_str(), token_provider(config, &http)),
                };

            info!(
                project = %settings.project,
                topic = %settings.topic,
                "Pub/Sub sink ready"
            );
            Ok(Arc::new(PubSubSink::new(
                http,
                endpoint,
                settings.project.clone(),
                tokens,
            )))
        }
    }
}

/// Build the store the processor appends rows to.
pub fn build_store(
    config: &GcpConfig,
    settings: &ProcessorSettings,
) -> Result<Arc<dyn RowStore>, GcpError> {
    match config.backend {
        Backend::Memory => {
            warn!(
                capacity = MEMORY_BACKEND_CAPACITY,
                "Using in-memory row store; inserted rows stay in this process and the oldest are evicted past capacity"
            );
            Ok(Arc::new(InMemoryRowStore::bounded(MEMORY_BACKEND_CAPACITY)))
        }
        Backend::Gcp => {
            let http = http_client(Duration::from_secs(config.request_timeout_seconds))?;
            let tokens = token_provider(config, &http);

            info!(table = %settings.table, "BigQuery row store ready");
            Ok(Arc::new(BigQueryRowStore::new(
                http,
                &config.bigquery_endpoint,
                tokens,
            )))
        }
    }
}

fn emulator_host(config: &GcpConfig) -> Option<&str> {
    config
        .pubsub_emulator_host
        .as_deref()
        .map(str::trim)
        .filter(|host| !host.is_empty())
}

fn token_provider(config: &GcpConfig, http: &reqwest::Client) -> Arc<dyn TokenProvider> {
    match config.access_token.as_deref() {
        Some(token) if !token.is_empty() => Arc::new(StaticTokenProvider::new(token)),
        _ => Arc::new(MetadataTokenProvider::new(http.clone())),
    }
}

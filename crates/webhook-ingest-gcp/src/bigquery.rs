//! BigQuery row store using the `tabledata.insertAll` streaming API.

use crate::{normalize_endpoint, post_json, TokenProvider};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use webhook_ingest_core::{RowStore, StoreError, TableRef, WebhookRecord};

#[cfg(test)]
#[path = "bigquery_tests.rs"]
mod tests;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Deserialize)]
struct InsertError {
    index: u32,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    message: String,
}

/// Build the `json` object for one row.
///
/// `raw_data` is sent as the JSON text string, which is what a BigQuery
/// `JSON` column expects from streaming inserts; it is never re-serialized.
pub fn row_json(record: &WebhookRecord) -> serde_json::Value {
    serde_json::json!({
        "event_type": record.event_type,
        "event_timestamp": record.event_timestamp,
        "raw_data": record.raw_data_str(),
    })
}

/// Streams webhook records into a BigQuery table.
pub struct BigQueryRowStore {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
}

impl BigQueryRowStore {
    pub fn new(http: reqwest::Client, endpoint: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            endpoint: normalize_endpoint(endpoint),
            tokens,
        }
    }

    fn insert_all_url(&self, table: &TableRef) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint,
            table.project(),
            table.dataset(),
            table.table()
        )
    }
}

#[async_trait]
impl RowStore for BigQueryRowStore {
    async fn insert(&self, table: &TableRef, record: &WebhookRecord) -> Result<(), StoreError> {
        let request = serde_json::json!({
            "rows": [{ "json": row_json(record) }]
        });

        let response: InsertAllResponse =
            post_json(&self.http, self.tokens.as_ref(), &self.insert_all_url(table), &request)
                .await
                .map_err(|e| e.into_store_error())?;

        if !response.insert_errors.is_empty() {
            let errors = response
                .insert_errors
                .iter()
                .flat_map(|row| {
                    row.errors.iter().map(move |e| {
                        format!(
                            "row {}: {} at '{}': {}",
                            row.index, e.reason, e.location, e.message
                        )
                    })
                })
                .collect();
            return Err(StoreError::RowErrors { errors });
        }

        debug!(table = %table, event_type = %record.event_type, "Streamed row into BigQuery");
        Ok(())
    }
}

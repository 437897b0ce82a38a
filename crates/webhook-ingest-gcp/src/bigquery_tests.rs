//! Tests for [`BigQueryRowStore`] against a mock BigQuery endpoint.

use super::*;
use crate::StaticTokenProvider;
use webhook_ingest_core::WebhookPayload;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const INSERT_PATH: &str =
    "/bigquery/v2/projects/test-project/datasets/webhooks/tables/events/insertAll";

fn table() -> TableRef {
    TableRef::new("test-project", "webhooks", "events").unwrap()
}

fn store_for(server: &MockServer) -> BigQueryRowStore {
    BigQueryRowStore::new(
        reqwest::Client::new(),
        &server.uri(),
        Arc::new(StaticTokenProvider::new("ya29.bq")),
    )
}

fn record(body: &str) -> WebhookRecord {
    WebhookRecord::from_payload(WebhookPayload::from_slice(body.as_bytes()).unwrap())
}

#[test]
fn test_row_json_keeps_raw_data_text() {
    let record = record(r#"{"eventType":"a","timestamp":"t","data":{"x": [1, 2]}}"#);

    assert_eq!(
        row_json(&record),
        serde_json::json!({
            "event_type": "a",
            "event_timestamp": "t",
            "raw_data": r#"{"x": [1, 2]}"#,
        })
    );
}

#[test]
fn test_row_json_without_data_sends_null() {
    let record = record(r#"{"eventType":"a"}"#);
    assert_eq!(row_json(&record)["raw_data"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_insert_streams_one_row() {
    let server = MockServer::start().await;
    let record = record(r#"{"eventType":"message.sent","timestamp":"2025-08-29T10:00:00Z","data":{"contactId":"123"}}"#);

    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .and(header("Authorization", "Bearer ya29.bq"))
        .and(body_json(serde_json::json!({
            "rows": [{
                "json": {
                    "event_type": "message.sent",
                    "event_timestamp": "2025-08-29T10:00:00Z",
                    "raw_data": r#"{"contactId":"123"}"#
                }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "bigquery#tableDataInsertAllResponse"
        })))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server).insert(&table(), &record).await.unwrap();
}

#[tokio::test]
async fn test_insert_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "bigquery#tableDataInsertAllResponse",
            "insertErrors": [{
                "index": 0,
                "errors": [{
                    "reason": "invalid",
                    "location": "raw_data",
                    "message": "Invalid JSON"
                }]
            }]
        })))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .insert(&table(), &record(r#"{"eventType":"a"}"#))
        .await;

    match result {
        Err(StoreError::RowErrors { errors }) => {
            assert_eq!(errors, vec!["row 0: invalid at 'raw_data': Invalid JSON"]);
        }
        other => panic!("expected row errors, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_table_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": 404, "message": "Not found: Table test-project:webhooks.events" }
        })))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .insert(&table(), &record(r#"{"eventType":"a"}"#))
        .await;

    match result {
        Err(StoreError::Rejected { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("Not found"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

//! End-to-end tests: webhook in, warehouse row out.

mod common;

use common::{table, Pipeline, SAMPLE_WEBHOOK};
use serde_json::json;
use webhook_ingest_core::StoreError;

#[tokio::test]
async fn test_webhook_becomes_one_row() {
    let pipeline = Pipeline::new();

    pipeline.post_webhook(SAMPLE_WEBHOOK).await;
    let deliveries = pipeline.deliver_pending().await;

    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0.as_u16(), 200);
    assert_eq!(deliveries[0].1, json!({"status": "inserted"}));

    let rows = pipeline.store.rows_in(&table()).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event_type, "message.sent");
    assert_eq!(rows[0].event_timestamp, "2025-08-29T10:00:00Z");
    assert_eq!(rows[0].raw_data_str(), Some(r#"{"contactId":"123"}"#));
}

#[tokio::test]
async fn test_raw_data_keeps_source_text() {
    let pipeline = Pipeline::new();
    let data = "{ \"z\": 1.50,\n  \"a\": [true, null, \"\\u00e9\"] }";
    let body = format!(r#"{{"eventType":"contact.updated","timestamp":"t","data":{}}}"#, data);

    pipeline.post_webhook(&body).await;
    pipeline.deliver_pending().await;

    let rows = pipeline.store.rows_in(&table()).await;
    assert_eq!(rows[0].raw_data_str(), Some(data));
}

#[tokio::test]
async fn test_missing_fields_become_empty_and_null() {
    let pipeline = Pipeline::new();

    pipeline.post_webhook(r#"{"unrelated":true}"#).await;
    pipeline.post_webhook(r#"{"eventType":"x","data":null}"#).await;
    pipeline.deliver_pending().await;

    let rows = pipeline.store.rows_in(&table()).await;
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].event_type, "");
    assert_eq!(rows[0].event_timestamp, "");
    assert_eq!(rows[0].raw_data_str(), None);

    assert_eq!(rows[1].event_type, "x");
    assert_eq!(rows[1].raw_data_str(), None);
}

#[tokio::test]
async fn test_accepted_non_object_is_dropped_downstream() {
    let pipeline = Pipeline::new();

    let (status, _) = pipeline.post_webhook("[1,2,3]").await;
    assert_eq!(status.as_u16(), 200);

    let deliveries = pipeline.deliver_pending().await;

    assert_eq!(deliveries[0].0.as_u16(), 200);
    assert_eq!(deliveries[0].1, json!({"status": "dropped"}));
    assert!(pipeline.store.rows().await.is_empty());
    assert_eq!(pipeline.projector.stats().dropped, 1);
}

#[tokio::test]
async fn test_redelivery_after_insert_failure() {
    let pipeline = Pipeline::new();
    pipeline.post_webhook(SAMPLE_WEBHOOK).await;
    let queued = pipeline.sink.drain().await;

    pipeline
        .store
        .fail_with(StoreError::Rejected {
            status: 503,
            message: "backend error".to_string(),
        })
        .await;
    let (failed, _) = pipeline.deliver(&queued[0]).await;

    pipeline.store.recover().await;
    let (retried, body) = pipeline.deliver(&queued[0]).await;

    assert_eq!(failed.as_u16(), 500);
    assert_eq!(retried.as_u16(), 200);
    assert_eq!(body, json!({"status": "inserted"}));
    assert_eq!(pipeline.store.rows().await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_delivery_produces_duplicate_rows() {
    let pipeline = Pipeline::new();
    pipeline.post_webhook(SAMPLE_WEBHOOK).await;
    let queued = pipeline.sink.drain().await;

    pipeline.deliver(&queued[0]).await;
    pipeline.deliver(&queued[0]).await;

    let rows = pipeline.store.rows_in(&table()).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], rows[1]);
}

#[tokio::test]
async fn test_rejected_webhooks_never_reach_the_table() {
    let pipeline = Pipeline::new();

    pipeline.post_webhook("{not json").await;
    pipeline.post_webhook("").await;
    pipeline.post_webhook(SAMPLE_WEBHOOK).await;
    pipeline.deliver_pending().await;

    assert_eq!(pipeline.store.rows().await.len(), 1);
    assert_eq!(pipeline.receiver_metrics.intake_count("invalid_json"), 2);
    assert_eq!(pipeline.processor_metrics.projection_count("inserted"), 1);
}

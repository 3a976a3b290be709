//! Integration tests for the HTTP collection store client

mod support;

use axum::http::Method;
use serde_json::json;

use catalog_loader::app::store::{ApiCollectionStore, CollectionPayload, CollectionStore};
use catalog_loader::errors::StoreError;

use support::{http_handler, MockServer};

fn store(server: &MockServer, api_key: Option<&str>) -> ApiCollectionStore {
    ApiCollectionStore::new(
        http_handler(),
        &server.base_url(),
        api_key.map(str::to_string),
    )
    .unwrap()
}

fn payload() -> CollectionPayload {
    CollectionPayload {
        label: "Dataset A".to_string(),
        summary: "About A".to_string(),
        publisher: Some("Pub".to_string()),
        publisher_url: None,
        countries: vec!["gb".to_string()],
        data_url: None,
        category: None,
        frequency: None,
        foreign_id: None,
    }
}

#[tokio::test]
async fn test_lookup_absent_and_found() {
    let server = MockServer::start().await;
    server.get_json("/api/2/collections", &json!({"results": []}));
    server.route_with_query(
        Method::GET,
        "/api/2/collections",
        ("filter:foreign_id", "ds-a"),
        200,
        json!({"results": [{"id": 42, "foreign_id": "ds-a", "label": "A"}]}).to_string(),
    );

    let store = store(&server, Some("secret"));

    assert!(store
        .get_collection_by_foreign_id("ds-missing")
        .await
        .unwrap()
        .is_none());

    let found = store
        .get_collection_by_foreign_id("ds-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.collection_id, "42");
    assert_eq!(found.foreign_id.as_deref(), Some("ds-a"));

    let requests = server.requests_to("/api/2/collections");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].query_value("filter:foreign_id"), Some("ds-a"));
    assert_eq!(requests[1].authorization.as_deref(), Some("ApiKey secret"));
}

#[tokio::test]
async fn test_create_posts_payload_with_api_key() {
    let server = MockServer::start().await;
    server.route(
        Method::POST,
        "/api/2/collections",
        200,
        json!({"collection_id": "7", "foreign_id": "ds-a"}).to_string(),
    );

    let store = store(&server, Some("k"));
    let created = store
        .create_collection(&CollectionPayload {
            category: Some("other".to_string()),
            foreign_id: Some("ds-a".to_string()),
            ..payload()
        })
        .await
        .unwrap();
    assert_eq!(created.collection_id, "7");

    let requests = server.requests_to("/api/2/collections");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].authorization.as_deref(), Some("ApiKey k"));

    let body = requests[0].json();
    assert_eq!(body["foreign_id"], "ds-a");
    assert_eq!(body["category"], "other");
    assert_eq!(body["label"], "Dataset A");
    assert_eq!(body["countries"], json!(["gb"]));
    assert!(body.get("frequency").is_none());
}

#[tokio::test]
async fn test_update_puts_to_collection_path() {
    let server = MockServer::start().await;
    server.route(
        Method::PUT,
        "/api/2/collections/42",
        200,
        json!({"id": "42", "label": "Dataset A"}).to_string(),
    );

    let store = store(&server, None);
    let updated = store
        .update_collection(
            "42",
            &CollectionPayload {
                frequency: Some(None),
                ..payload()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.collection_id, "42");

    let requests = server.requests_to("/api/2/collections/42");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::PUT);
    assert!(requests[0].authorization.is_none());

    let body = requests[0].json();
    assert!(body.get("category").is_none());
    assert!(body.get("foreign_id").is_none());
    assert_eq!(body.get("frequency"), Some(&serde_json::Value::Null));
}

#[tokio::test]
async fn test_bulk_write_sends_entities() {
    let server = MockServer::start().await;
    server.route(Method::POST, "/api/2/collections/42/_bulk", 204, "");

    let store = store(&server, Some("k"));
    let entities = vec![json!({"id": "e-1"}), json!({"id": "e-2"})];
    let written = store.write_entities("42", &entities).await.unwrap();
    assert_eq!(written, 2);

    assert_eq!(store.write_entities("42", &[]).await.unwrap(), 0);

    let requests = server.requests_to("/api/2/collections/42/_bulk");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json(), json!(entities));
}

#[tokio::test]
async fn test_api_error_carries_status_and_message() {
    let server = MockServer::start().await;
    server.route(
        Method::POST,
        "/api/2/collections",
        403,
        json!({"status": "error", "message": "Forbidden for this key"}).to_string(),
    );

    let store = store(&server, Some("bad"));
    let err = store.create_collection(&payload()).await.unwrap_err();
    match err {
        StoreError::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Forbidden for this key");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn test_response_without_id_is_rejected() {
    let server = MockServer::start().await;
    server.route(
        Method::POST,
        "/api/2/collections",
        200,
        json!({"label": "no id"}).to_string(),
    );

    let store = store(&server, None);
    let err = store.create_collection(&payload()).await.unwrap_err();
    assert!(matches!(err, StoreError::MissingCollectionId));
}

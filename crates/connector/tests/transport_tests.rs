//! Production cluster client against a mock HTTP server.

use elasticsearch::http::transport::Transport;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use elk_connector::query::{SearchOptions, compose_search};
use elk_connector::{ClusterClient, ClusterError, EsClusterClient};

async fn client() -> (ServerGuard, EsClusterClient) {
    let server = Server::new_async().await;
    let transport = Transport::single_node(&server.url()).unwrap();
    (server, EsClusterClient::from_transport(transport))
}

fn path(pattern: &str) -> Matcher {
    Matcher::Regex(format!("^{}(\\?.*)?$", pattern))
}

// ============================================================================
// Ping classification
// ============================================================================

#[tokio::test]
async fn test_ping_success() {
    let (mut server, client) = client().await;
    let mock = server
        .mock("HEAD", path("/"))
        .with_status(200)
        .create_async()
        .await;

    client.ping().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ping_unavailable_is_recoverable() {
    let (mut server, client) = client().await;
    let _mock = server
        .mock("HEAD", path("/"))
        .with_status(503)
        .create_async()
        .await;

    let err = client.ping().await.unwrap_err();
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn test_ping_unauthorized_is_transport() {
    let (mut server, client) = client().await;
    let _mock = server
        .mock("HEAD", path("/"))
        .with_status(401)
        .create_async()
        .await;

    let err = client.ping().await.unwrap_err();
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_ping_unreachable_host_is_recoverable() {
    let transport = Transport::single_node("http://127.0.0.1:9").unwrap();
    let client = EsClusterClient::from_transport(transport);

    let err = client.ping().await.unwrap_err();
    assert!(err.is_recoverable());
}

// ============================================================================
// Index operations
// ============================================================================

#[tokio::test]
async fn test_index_exists_maps_not_found_to_false() {
    let (mut server, client) = client().await;
    let _present = server
        .mock("HEAD", path("/present"))
        .with_status(200)
        .create_async()
        .await;
    let _absent = server
        .mock("HEAD", path("/absent"))
        .with_status(404)
        .create_async()
        .await;

    assert!(client.index_exists("present").await.unwrap());
    assert!(!client.index_exists("absent").await.unwrap());
}

#[tokio::test]
async fn test_create_index_sends_body() {
    let (mut server, client) = client().await;
    let mock = server
        .mock("PUT", path("/people"))
        .match_body(Matcher::PartialJson(json!({
            "mappings": { "properties": { "age": { "type": "integer" } } }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"acknowledged":true,"shards_acknowledged":true,"index":"people"}"#)
        .create_async()
        .await;

    let body = json!({ "mappings": { "properties": { "age": { "type": "integer" } } } });
    let response = client.create_index("people", body).await.unwrap();

    assert_eq!(response["acknowledged"], true);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_keeps_body() {
    let (mut server, client) = client().await;
    let _mock = server
        .mock("DELETE", path("/ghost"))
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"type":"index_not_found_exception"},"status":404}"#)
        .create_async()
        .await;

    let err = client.delete_index("ghost").await.unwrap_err();

    match err {
        ClusterError::Api {
            operation,
            status,
            body,
        } => {
            assert_eq!(operation, "delete index");
            assert_eq!(status, 404);
            assert!(body.contains("index_not_found_exception"));
        }
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_count_reads_count_field() {
    let (mut server, client) = client().await;
    let _mock = server
        .mock("GET", path("/people/_count"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"count":900,"_shards":{"total":1,"successful":1,"skipped":0,"failed":0}}"#)
        .create_async()
        .await;

    assert_eq!(client.count("people").await.unwrap(), 900);
}

#[tokio::test]
async fn test_undecodable_body_is_decode_error() {
    let (mut server, client) = client().await;
    let _mock = server
        .mock("GET", path("/people/_mapping"))
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client.get_mapping("people").await.unwrap_err();
    assert!(matches!(err, ClusterError::Decode { operation: "get mapping", .. }));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_posts_composed_body() {
    let (mut server, client) = client().await;
    let options = SearchOptions::new()
        .with_query(json!({ "match": { "active": true } }))
        .with_filter(json!({ "range": { "age": { "gt": 30 } } }))
        .with_limit(5);
    let request = compose_search(&options);

    let mock = server
        .mock("POST", path("/people/_search"))
        .match_body(Matcher::Json(request.to_value()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "took": 2,
                "timed_out": false,
                "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let response = client.search("people", &request).await.unwrap();

    assert_eq!(response["hits"]["total"]["value"], 0);
    mock.assert_async().await;
}

//! Integration tests for the HTTP retrieval adapter
//!
//! A wiremock server stands in for the bridge service in front of a memory
//! backend.

use std::collections::BTreeMap;

use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use memory_bench::config::{MethodPlan, RequestConfig};
use memory_bench::error::RetrievalError;
use memory_bench::retrieval::{
    HttpRetrievalAdapter, ResponseShape, RetrievalAdapter, RetrievedContent,
};

fn request_config(max_retries: u32) -> RequestConfig {
    RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    }
}

fn adapter(server: &MockServer, route: &str, id: &str, shape: ResponseShape) -> HttpRetrievalAdapter {
    HttpRetrievalAdapter::new(
        id,
        format!("{}{}", server.uri(), route),
        shape,
        request_config(0),
    )
    .expect("Failed to create adapter")
}

#[tokio::test]
async fn test_plain_text_context_with_identity() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context"))
        .and(body_json(json!({
            "query": "我最近在忙什么？",
            "method": "context",
            "user_id": "user-7"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "context": "用户最近在准备跳槽面试"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = adapter(&mock_server, "/context", "context", ResponseShape::PlainText);
    let content = adapter
        .retrieve("我最近在忙什么？", Some("user-7"))
        .await
        .unwrap();

    assert_eq!(
        content,
        RetrievedContent::Text("用户最近在准备跳槽面试".to_string())
    );
}

#[tokio::test]
async fn test_identity_is_omitted_when_absent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/profile"))
        .and(body_json(json!({"query": "q", "method": "profile"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"profiles": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = adapter(&mock_server, "/profile", "profile", ResponseShape::Profile);
    let content = adapter.retrieve("q", None).await.unwrap();
    assert!(content.is_empty());
}

#[tokio::test]
async fn test_memory_items_are_normalized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/related"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "related_memories": [
                {"memory": {"memory_id": "m-1", "content": "喜欢喝拿铁"}, "similarity_score": 0.91},
                {"memory_id": "m-2", "content": "每周三去健身房"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let adapter = adapter(&mock_server, "/related", "memory_items", ResponseShape::MemoryItems);
    let content = adapter.retrieve("习惯", None).await.unwrap();

    match &content {
        RetrievedContent::Items(items) => {
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].content, "喜欢喝拿铁");
            assert_eq!(items[1].content, "每周三去健身房");
        }
        other => panic!("expected items, got {:?}", other),
    }
    let text = content.to_text();
    assert!(text.contains("喜欢喝拿铁"));
    assert!(text.contains("\n\n"));
}

#[tokio::test]
async fn test_from_plan_sends_headers_and_label() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("X-Api-Key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{"id": "e1", "timestamp": "2024-05-01", "content": "去了杭州出差"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut headers = BTreeMap::new();
    headers.insert("X-Api-Key".to_string(), "secret".to_string());
    let plan = MethodPlan {
        id: "search_event".to_string(),
        label: Some("事件搜索".to_string()),
        endpoint: format!("{}/events", mock_server.uri()),
        shape: ResponseShape::Events,
        headers,
    };

    let adapter = HttpRetrievalAdapter::from_plan(&plan, request_config(0)).unwrap();
    assert_eq!(adapter.method_id(), "search_event");
    assert_eq!(adapter.label(), "事件搜索");

    let content = adapter.retrieve("出差", None).await.unwrap();
    assert!(content.to_text().contains("去了杭州出差"));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown user"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = HttpRetrievalAdapter::new(
        "context",
        format!("{}/context", mock_server.uri()),
        ResponseShape::PlainText,
        request_config(3),
    )
    .unwrap();

    let err = adapter.retrieve("q", None).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_server_error_is_retried_then_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&mock_server)
        .await;

    let adapter = HttpRetrievalAdapter::new(
        "context",
        format!("{}/context", mock_server.uri()),
        ResponseShape::PlainText,
        request_config(1),
    )
    .unwrap();

    let err = adapter.retrieve("q", None).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Unavailable { retries: 2, .. }));
}

#[tokio::test]
async fn test_unreadable_payload_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let adapter = adapter(&mock_server, "/context", "context", ResponseShape::PlainText);
    let err = adapter.retrieve("q", None).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidResponse { .. }));
}

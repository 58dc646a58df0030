//! Wire-level tests for the embedding and rerank clients against a mock
//! server: request shape, auth headers, and retry behavior.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::RerankerConfig;
use crate::embeddings::api::{EmbeddingApiClient, EmbeddingApiConfig};
use crate::embeddings::RerankerProvider;
use crate::error::FinqueryError;

fn test_config(base_url: &str) -> EmbeddingApiConfig {
    EmbeddingApiConfig {
        base_url: base_url.to_string(),
        api_key: Some("test-api-key".to_string()),
        model: "text-embedding-3-large".to_string(),
        timeout_secs: 10,
        max_attempts: 3,
        retry_base_ms: 1,
    }
}

fn embedding_response(embeddings: Vec<Vec<f32>>, prompt_tokens: u64) -> serde_json::Value {
    json!({
        "data": embeddings
            .into_iter()
            .map(|e| json!({ "embedding": e }))
            .collect::<Vec<_>>(),
        "usage": { "prompt_tokens": prompt_tokens }
    })
}

#[tokio::test]
async fn test_embed_success_reports_usage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(embedding_response(vec![vec![0.1, 0.2, 0.3]], 7)),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let batch = client.embed(&["quarterly revenue"]).await.unwrap();

    assert_eq!(batch.vectors, vec![vec![0.1, 0.2, 0.3]]);
    assert_eq!(batch.total_tokens, 7);
}

#[tokio::test]
async fn test_embed_request_shape_and_auth_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-large",
            "input": ["quarterly revenue"]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.5]], 3)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    client.embed(&["quarterly revenue"]).await.unwrap();
}

#[tokio::test]
async fn test_embed_retries_rate_limit_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.9]], 2)),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let batch = client.embed(&["text"]).await.unwrap();
    assert_eq!(batch.vectors.len(), 1);
}

#[tokio::test]
async fn test_embed_retries_server_error_then_succeeds() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.4]], 1)),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    assert!(client.embed(&["text"]).await.is_ok());
}

#[tokio::test]
async fn test_embed_exhausted_retries_return_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let err = client.embed(&["text"]).await.unwrap_err();
    assert!(matches!(
        err,
        FinqueryError::ApiRateLimit {
            retry_after: Some(30)
        }
    ));
}

#[tokio::test]
async fn test_embed_auth_error_does_not_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let err = client.embed(&["text"]).await.unwrap_err();
    assert!(matches!(err, FinqueryError::ApiAuth(_)));
}

#[tokio::test]
async fn test_embed_length_mismatch_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.1]], 5)),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let err = client.embed(&["one", "two"]).await.unwrap_err();
    assert!(err.to_string().contains("Expected 2 embeddings"));
}

#[tokio::test]
async fn test_embed_batch_preserves_order_and_sums_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({ "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(embedding_response(vec![vec![0.1], vec![0.2]], 4)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({ "input": ["c"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(embedding_response(vec![vec![0.3]], 2)),
        )
        .mount(&mock_server)
        .await;

    let client = EmbeddingApiClient::new(test_config(&mock_server.uri())).unwrap();
    let batch = client.embed_batch(&["a", "b", "c"], 2).await.unwrap();

    assert_eq!(batch.vectors, vec![vec![0.1], vec![0.2], vec![0.3]]);
    assert_eq!(batch.total_tokens, 6);
}

#[tokio::test]
async fn test_rerank_request_shape_and_parsing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rerank"))
        .and(header("authorization", "Bearer rerank-key"))
        .and(body_partial_json(json!({
            "model": "rerank-english-v3.0",
            "query": "apple revenue",
            "top_n": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "index": 1, "relevance_score": 0.92 },
                { "index": 0, "relevance_score": 0.41 }
            ]
        })))
        .mount(&mock_server)
        .await;

    let config = RerankerConfig {
        api_key: "rerank-key".to_string(),
        model: "rerank-english-v3.0".to_string(),
        base_url: mock_server.uri(),
        timeout_secs: 10,
        cost_per_call_usd: 0.002,
    };
    let provider = RerankerProvider::new(Some(&config)).unwrap();

    let results = provider
        .rerank(
            "apple revenue",
            &["first chunk".to_string(), "second chunk".to_string()],
            2,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].index, 1);
    assert!((results[0].relevance_score - 0.92).abs() < 1e-6);
}

#[tokio::test]
async fn test_rerank_api_error_surfaces() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rerank"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let config = RerankerConfig {
        api_key: "rerank-key".to_string(),
        model: "rerank-english-v3.0".to_string(),
        base_url: mock_server.uri(),
        timeout_secs: 10,
        cost_per_call_usd: 0.002,
    };
    let provider = RerankerProvider::new(Some(&config)).unwrap();

    let err = provider
        .rerank("query", &["doc".to_string()], 1)
        .await
        .unwrap_err();
    assert!(matches!(err, FinqueryError::Reranker(_)));
}

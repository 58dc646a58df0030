//! Index client tests against a mock control plane and data plane.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use finquery::config::IndexConfig;
use finquery::error::FinqueryError;
use finquery::index::VectorIndexClient;
use finquery::models::{RecordMetadata, SearchMethod, VectorRecord};

fn test_config(control_url: &str, host: Option<&str>) -> IndexConfig {
    IndexConfig {
        api_key: Some("test-index-key".to_string()),
        index_name: "investment-research".to_string(),
        cloud: "aws".to_string(),
        region: "us-east-1".to_string(),
        namespace: "".to_string(),
        control_url: control_url.to_string(),
        host: host.map(str::to_string),
        timeout_secs: 10,
        upsert_batch_size: 2,
    }
}

fn record(id: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        values: vec![0.1, 0.2],
        metadata: RecordMetadata {
            document_name: "10k.pdf".to_string(),
            page_number: 1,
            chunk_index: 0,
            total_pages: 4,
            text: "Revenue grew.".to_string(),
        },
    }
}

fn index_description(dimension: usize, host: &str, ready: bool) -> serde_json::Value {
    json!({
        "name": "investment-research",
        "dimension": dimension,
        "metric": "cosine",
        "host": host,
        "status": { "ready": ready, "state": if ready { "Ready" } else { "Initializing" } }
    })
}

#[tokio::test]
async fn test_search_parses_matches_with_float_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "test-index-key"))
        .and(body_partial_json(json!({
            "topK": 5,
            "includeMetadata": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {
                    "id": "10k.pdf::chunk_3",
                    "score": 0.87,
                    "metadata": {
                        "document_name": "10k.pdf",
                        "page_number": 12.0,
                        "chunk_index": 3.0,
                        "total_pages": 90.0,
                        "text": "Revenue grew 14%."
                    }
                }
            ]
        })))
        .mount(&server)
        .await;

    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some(&server.uri()))).unwrap();
    let results = client.search(&[0.1, 0.2], 5, None).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "10k.pdf::chunk_3");
    assert!((results[0].score - 0.87).abs() < 1e-6);
    assert_eq!(results[0].metadata.page_number, 12);
    assert_eq!(results[0].search_method, SearchMethod::Semantic);
}

#[tokio::test]
async fn test_ensure_index_noop_when_dimension_matches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(3072, "idx.example.com", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(test_config(&server.uri(), None)).unwrap();
    client.ensure_index(3072, false).await.unwrap();
}

#[tokio::test]
async fn test_ensure_index_rejects_dimension_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(1536, "idx.example.com", true)),
        )
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(test_config(&server.uri(), None)).unwrap();
    let err = client.ensure_index(3072, false).await.unwrap_err();
    assert!(matches!(err, FinqueryError::Config(_)));
    assert!(err.to_string().contains("dimension 1536"));
}

#[tokio::test]
async fn test_ensure_index_creates_missing_index() {
    let server = MockServer::start().await;

    // First describe: missing. After creation, the readiness poll sees it.
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_partial_json(json!({
            "name": "investment-research",
            "dimension": 3072,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(index_description(3072, "idx.example.com", false)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(3072, "idx.example.com", true)),
        )
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(test_config(&server.uri(), None)).unwrap();
    client.ensure_index(3072, false).await.unwrap();
}

#[tokio::test]
async fn test_force_recreate_leaves_matching_index_intact() {
    let server = MockServer::start().await;

    // Describe is the only call allowed: a matching dimension means no
    // DELETE and no create, force flag or not.
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(3072, "idx.example.com", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(test_config(&server.uri(), None)).unwrap();
    client.ensure_index(3072, true).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
}

#[tokio::test]
async fn test_force_recreate_rebuilds_mismatched_index() {
    let server = MockServer::start().await;

    // First describe reports the wrong dimension; after deletion the poll
    // sees it gone, and the readiness poll sees the replacement.
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(1536, "idx.example.com", true)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/indexes/investment-research"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes"))
        .and(body_partial_json(json!({ "dimension": 3072 })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(index_description(3072, "idx.example.com", false)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indexes/investment-research"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(index_description(3072, "idx.example.com", true)),
        )
        .mount(&server)
        .await;

    let client = VectorIndexClient::new(test_config(&server.uri(), None)).unwrap();
    client.ensure_index(3072, true).await.unwrap();
}

#[tokio::test]
async fn test_upsert_batches_by_configured_size() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 2 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "upsertedCount": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some(&server.uri()))).unwrap();
    let records = vec![record("a::chunk_0"), record("a::chunk_1"), record("a::chunk_2")];
    let total = client.upsert(&records).await.unwrap();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn test_upsert_empty_is_noop() {
    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some("http://unused.invalid")))
            .unwrap();
    assert_eq!(client.upsert(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stats_maps_namespaces() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalVectorCount": 42,
            "dimension": 3072,
            "namespaces": { "": { "vectorCount": 42 } }
        })))
        .mount(&server)
        .await;

    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some(&server.uri()))).unwrap();
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.total_vector_count, 42);
    assert_eq!(stats.dimension, 3072);
    assert_eq!(stats.namespaces.get(""), Some(&42));
}

#[tokio::test]
async fn test_delete_all_targets_namespace() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vectors/delete"))
        .and(body_partial_json(json!({ "deleteAll": true, "namespace": "" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some(&server.uri()))).unwrap();
    client.delete_all().await.unwrap();
}

#[tokio::test]
async fn test_search_error_surfaces_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
        .mount(&server)
        .await;

    let client =
        VectorIndexClient::new(test_config("http://unused.invalid", Some(&server.uri()))).unwrap();
    let err = client.search(&[0.1], 5, None).await.unwrap_err();
    assert!(matches!(err, FinqueryError::Index(_)));
    assert!(err.to_string().contains("bad filter"));
}

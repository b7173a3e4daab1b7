use super::load_existing_config as load_existing_config_impl;
use super::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.base_dir, temp_dir.path());
    assert!(!config.embedding.host.is_empty());
    assert!(config.embedding.port > 0);
    assert!(!config.generation.model.is_empty());
}

#[test]
fn invalid_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[retrieval]\ntop_k = 0\n")
        .expect("should write config");

    let config = load_existing_config_impl(temp_dir.path());
    assert_eq!(config.retrieval.top_k, 5);
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn unreachable_embedding_service() {
    let embedding = EmbeddingConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..EmbeddingConfig::default()
    };
    assert!(test_embedding_connection(&embedding).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_check_uses_the_model_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "nomic-embed-text:latest" }]
        })))
        .mount(&server)
        .await;

    let address = server.address();
    let available = EmbeddingConfig {
        host: address.ip().to_string(),
        port: address.port(),
        ..EmbeddingConfig::default()
    };
    let missing = EmbeddingConfig {
        model: "mxbai-embed-large".to_string(),
        ..available.clone()
    };

    let (available, missing) = tokio::task::spawn_blocking(move || {
        (
            test_embedding_connection(&available),
            test_embedding_connection(&missing),
        )
    })
    .await
    .expect("blocking task should complete");

    assert!(available.is_ok());
    assert!(matches!(missing, Err(EmbeddingError::Config(_))));
}

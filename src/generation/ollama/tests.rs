use super::*;
use crate::config::Provider;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> GenerationConfig {
    let mut config = GenerationConfig {
        provider: Provider::Ollama,
        model: "llama3".to_string(),
        retry_attempts: 1,
        ..GenerationConfig::default()
    };
    config
        .set_base_url(&server.uri())
        .expect("mock server URL is valid");
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_without_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3",
            "stream": false,
            "options": { "temperature": 0.25 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3",
            "message": { "role": "assistant", "content": "Vacancy fell to 2%." },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaChatClient::new(&config_for(&server)).expect("should create client");
    let reply = tokio::task::spawn_blocking(move || {
        client.complete(&[ChatMessage::user("What happened to vacancy?")], 0.25)
    })
    .await
    .expect("blocking task should complete")
    .expect("completion should succeed");

    assert_eq!(reply, "Vacancy fell to 2%.");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_message_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;

    let client = OllamaChatClient::new(&config_for(&server)).expect("should create client");
    let result =
        tokio::task::spawn_blocking(move || client.complete(&[ChatMessage::user("hi")], 0.7))
            .await
            .expect("blocking task should complete");

    assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
}

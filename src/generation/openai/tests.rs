use super::*;
use crate::http::TransportError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> GenerationConfig {
    let mut config = GenerationConfig {
        model: "gpt-test".to_string(),
        retry_attempts: 1,
        ..GenerationConfig::default()
    };
    config
        .set_base_url(&format!("{}/v1", server.uri()))
        .expect("mock server URL is valid");
    config
}

fn prompt() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You answer questions about housing."),
        ChatMessage::user("Question: Did rents rise?\nContext: Rents rose 4%."),
    ]
}

#[test]
fn endpoint_follows_base_url() {
    let client = OpenAiChatClient::with_api_key(&GenerationConfig::default(), "key".to_string())
        .expect("should create client");
    assert_eq!(
        client.endpoint.as_str(),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn endpoint_keeps_unslashed_base_path() {
    let config = GenerationConfig {
        base_url: Url::parse("https://api.openai.com/v1").expect("valid url"),
        ..GenerationConfig::default()
    };
    let client = OpenAiChatClient::with_api_key(&config, "key".to_string())
        .expect("should create client");
    assert_eq!(
        client.endpoint.as_str(),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn missing_api_key_is_reported() {
    let config = GenerationConfig {
        api_key_env: "REPORT_QA_CHAT_KEY_THAT_IS_NEVER_SET".to_string(),
        ..GenerationConfig::default()
    };
    assert!(matches!(
        OpenAiChatClient::new(&config),
        Err(CompletionError::MissingApiKey(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn sends_messages_and_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-test",
            "temperature": 0.5,
            "messages": [
                { "role": "system", "content": "You answer questions about housing." },
                { "role": "user", "content": "Question: Did rents rise?\nContext: Rents rose 4%." }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "Yes, by 4%." } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiChatClient::with_api_key(&config_for(&server), "test-key".to_string())
        .expect("should create client");
    let reply = tokio::task::spawn_blocking(move || client.complete(&prompt(), 0.5))
        .await
        .expect("blocking task should complete")
        .expect("completion should succeed");

    assert_eq!(reply, "Yes, by 4%.");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_completion_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "role": "assistant", "content": "  " } } ]
        })))
        .mount(&server)
        .await;

    let client = OpenAiChatClient::with_api_key(&config_for(&server), "key".to_string())
        .expect("should create client");
    let result = tokio::task::spawn_blocking(move || client.complete(&prompt(), 0.7))
        .await
        .expect("blocking task should complete");

    assert!(matches!(result, Err(CompletionError::MalformedResponse(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_surface_as_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = OpenAiChatClient::with_api_key(&config_for(&server), "key".to_string())
        .expect("should create client");
    let result = tokio::task::spawn_blocking(move || client.complete(&prompt(), 0.7))
        .await
        .expect("blocking task should complete");

    assert!(matches!(
        result,
        Err(CompletionError::Transport(TransportError::Server { status: 500 }))
    ));
}

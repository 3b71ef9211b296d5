// tests/generation_client.rs
use std::time::Duration;

use crypto_research::config::AiConfig;
use crypto_research::synthesize::client::{
    build_client_from_config, ChatCompletionsClient, CompletionRequest, GenerationClient,
    GenerationError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(json_mode: bool) -> CompletionRequest {
    CompletionRequest {
        system: "You are a professional crypto analyst assistant.".into(),
        user: "Summarize.".into(),
        model: "mixtral-8x7b-32768".into(),
        temperature: 0.2,
        max_tokens: 500,
        json_mode,
    }
}

fn client(server: &MockServer) -> ChatCompletionsClient {
    ChatCompletionsClient::new(
        format!("{}/openai/v1/", server.uri()),
        Some("gsk-test".into()),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn posts_chat_completion_and_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({
            "model": "mixtral-8x7b-32768",
            "max_tokens": 500,
            "messages": [
                {"role": "system", "content": "You are a professional crypto analyst assistant."},
                {"role": "user", "content": "Summarize."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "BTC is up."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server).complete(&request(false)).await.unwrap();
    assert_eq!(out, "BTC is up.");
}

#[tokio::test]
async fn json_mode_requests_a_json_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"sections\":[]}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server).complete(&request(true)).await.unwrap();
    assert_eq!(out, "{\"sections\":[]}");
}

#[tokio::test]
async fn non_2xx_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limit reached"))
        .mount(&server)
        .await;

    let err = client(&server).complete(&request(false)).await.unwrap_err();
    match err {
        GenerationError::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("rate limit"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn blank_content_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "   "}}]
        })))
        .mount(&server)
        .await;

    let err = client(&server).complete(&request(false)).await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
}

#[serial_test::serial]
#[tokio::test]
async fn factory_honors_mock_mode() {
    std::env::set_var("GENERATION_TEST_MODE", "mock");
    let c = build_client_from_config(&AiConfig::default()).unwrap();
    std::env::remove_var("GENERATION_TEST_MODE");
    assert_eq!(c.provider_name(), "mock");
    assert!(c.complete(&request(false)).await.unwrap().contains("mock"));

    let cfg = AiConfig {
        provider: "mock".into(),
        ..Default::default()
    };
    assert_eq!(build_client_from_config(&cfg).unwrap().provider_name(), "mock");
}

#[serial_test::serial]
#[tokio::test]
async fn factory_builds_chat_client_for_groq() {
    std::env::remove_var("GENERATION_TEST_MODE");
    let c = build_client_from_config(&AiConfig::default()).unwrap();
    assert_eq!(c.provider_name(), "chat-completions");
}

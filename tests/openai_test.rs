//! Wiremock integration tests for OpenAiClient.

use std::sync::Arc;
use std::time::Duration;

use mealgate::providers::{CompletionProvider, CompletionRequest, OpenAiClient};
use mealgate::{
    CacheConfig, ErrorKind, ImageInput, Language, MealAnalyzer, MealgateError, Message,
    RetryConfig,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn request(text: &str) -> CompletionRequest {
    CompletionRequest::new(vec![Message::user(text)])
        .max_tokens(100)
        .temperature(0.2)
}

#[tokio::test]
async fn test_complete_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test_key"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let text = client.complete(&request("hi")).await.expect("complete should succeed");
    assert_eq!(text, "hello");
    assert_eq!(client.name(), "openai");
}

#[tokio::test]
async fn test_image_sent_as_data_url_part() {
    let mock_server = MockServer::start().await;
    let image = ImageInput::from_bytes(b"fake", "image/jpeg");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri())
        .unwrap()
        .model("gpt-4o");
    let req = CompletionRequest::new(vec![Message::user_with_image("what is this?", &image)]);
    client.complete(&req).await.expect("complete should succeed");

    let received = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let parts = &body["messages"][0]["content"];
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(parts[0], json!({"type": "text", "text": "what is this?"}));
    assert_eq!(
        parts[1],
        json!({"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,ZmFrZQ=="}})
    );
}

#[tokio::test]
async fn test_unauthorized() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "Incorrect API key provided"}})),
        )
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("bad_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert!(matches!(err, MealgateError::Unauthorized), "got {err:?}");
}

#[tokio::test]
async fn test_rate_limited_with_retry_after() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
}

#[tokio::test]
async fn test_quota_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "You exceeded your current quota", "code": "insufficient_quota"}
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
}

#[tokio::test]
async fn test_bad_request_is_validation_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "Invalid image"}})),
        )
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(err.to_string().contains("Invalid image"));
}

#[tokio::test]
async fn test_empty_choices_is_parse_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailed);
}

#[tokio::test]
async fn test_malformed_body_is_parse_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let err = client.complete(&request("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ParseFailed);
}

/// Full path: analyzer → gateway retry → HTTP → normalizer.
#[tokio::test]
async fn test_analyzer_retries_server_errors_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "```json\n{\"foodName\": \"Tteokbokki\", \"calories\": \"480\"}\n```",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::with_base_url("test_key", mock_server.uri()).unwrap();
    let analyzer = MealAnalyzer::builder(Arc::new(client))
        .retry(RetryConfig::new().initial_delay(Duration::from_millis(5)))
        .cache(CacheConfig::new().in_flight_grace(Duration::ZERO))
        .build();

    let analysis = analyzer.analyze_text("tteokbokki", Language::Korean).await;
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.food_name, "Tteokbokki");
    assert_eq!(analysis.calories, 480.0);
    assert_eq!(analysis.confidence, 75);
}

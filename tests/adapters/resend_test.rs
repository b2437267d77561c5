//! Resend adapter tests.

use outbound::providers::ResendProvider;
use outbound::{Attachment, Message, Provider};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn valid_message() -> Message {
    Message::new()
        .from("deals@example.com")
        .to("target@example.com")
        .subject("Teaser: Project Andes")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "049b9217-30b5-4f61-a8e3-4d2d12f9f5a7"
    }))
}

// ============================================================================
// Basic Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_ok() {
    let server = MockServer::start().await;
    let provider = ResendProvider::new("re_123456789").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer re_123456789"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "from": "deals@example.com",
            "to": ["target@example.com"],
            "subject": "Teaser: Project Andes",
            "html": "<h1>Hello</h1>",
            "text": "Hello"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = provider.send(&valid_message()).await;
    assert!(result.is_ok());
    let delivery = result.unwrap();
    assert_eq!(delivery.message_id, "049b9217-30b5-4f61-a8e3-4d2d12f9f5a7");
}

#[tokio::test]
async fn named_addresses_are_formatted() {
    let server = MockServer::start().await;
    let provider = ResendProvider::new("re_123456789").base_url(server.uri());

    let message = Message::new()
        .from(("Deal Desk", "deals@example.com"))
        .to(("Ana Ruiz", "ana@example.com"))
        .reply_to("partners@example.com")
        .subject("Hello")
        .text_body("Hi");

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_json(json!({
            "from": "Deal Desk <deals@example.com>",
            "to": ["Ana Ruiz <ana@example.com>"],
            "subject": "Hello",
            "text": "Hi",
            "reply_to": "partners@example.com"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(provider.send(&message).await.is_ok());
}

#[tokio::test]
async fn attachments_are_base64_encoded() {
    let server = MockServer::start().await;
    let provider = ResendProvider::new("re_123456789").base_url(server.uri());

    let message = valid_message()
        .attachment(Attachment::from_bytes("teaser.pdf", b"PDF content".to_vec()));

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_json(json!({
            "from": "deals@example.com",
            "to": ["target@example.com"],
            "subject": "Teaser: Project Andes",
            "html": "<h1>Hello</h1>",
            "text": "Hello",
            "attachments": [{
                "filename": "teaser.pdf",
                "content": "UERGIGNvbnRlbnQ=",
                "content_type": "application/pdf"
            }]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(provider.send(&message).await.is_ok());
}

// ============================================================================
// Error Response Tests
// ============================================================================

#[tokio::test]
async fn error_response_carries_provider_message() {
    let server = MockServer::start().await;
    let provider = ResendProvider::new("re_123456789").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "statusCode": 429,
            "message": "Too many requests",
            "name": "rate_limit_exceeded"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider.send(&valid_message()).await;
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("Too many requests"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn server_error_is_an_error() {
    let server = MockServer::start().await;
    let provider = ResendProvider::new("re_123456789").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    assert!(provider.send(&valid_message()).await.is_err());
}

// ============================================================================
// Validation Tests
// ============================================================================

#[tokio::test]
async fn send_without_from_returns_error() {
    let provider = ResendProvider::new("re_123456789");

    let message = Message::new()
        .to("target@example.com")
        .subject("Hello!")
        .text_body("Hi");

    let result = provider.send(&message).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("from"));
}

#[tokio::test]
async fn send_without_to_returns_error() {
    let provider = ResendProvider::new("re_123456789");

    let message = Message::new()
        .from("deals@example.com")
        .subject("Hello!")
        .text_body("Hi");

    let result = provider.send(&message).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("to"));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn empty_api_key_fails_validation() {
    let provider = ResendProvider::new("");
    assert!(provider.validate_config().is_err());
    assert!(ResendProvider::new("re_123").validate_config().is_ok());
}

#[test]
fn provider_name_is_resend() {
    assert_eq!(ResendProvider::new("re_123456789").name(), "resend");
}

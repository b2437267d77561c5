//! SendGrid adapter tests.

use outbound::providers::SendGridProvider;
use outbound::{Attachment, Message, Provider};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn valid_message() -> Message {
    Message::new()
        .from("deals@example.com")
        .to("target@example.com")
        .subject("Teaser: Project Andes")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
}

fn accepted_response() -> ResponseTemplate {
    ResponseTemplate::new(202).insert_header("X-Message-Id", "sg-msg-1")
}

#[tokio::test]
async fn successful_delivery_returns_ok() {
    let server = MockServer::start().await;
    let provider = SendGridProvider::new("SG.123").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(header("Authorization", "Bearer SG.123"))
        .and(body_json(json!({
            "personalizations": [{"to": [{"email": "target@example.com"}]}],
            "from": {"email": "deals@example.com"},
            "subject": "Teaser: Project Andes",
            "content": [
                {"type": "text/plain", "value": "Hello"},
                {"type": "text/html", "value": "<h1>Hello</h1>"}
            ]
        })))
        .respond_with(accepted_response())
        .expect(1)
        .mount(&server)
        .await;

    let result = provider.send(&valid_message()).await;
    assert!(result.is_ok());
    assert_eq!(result.unwrap().message_id, "sg-msg-1");
}

#[tokio::test]
async fn named_addresses_and_attachments() {
    let server = MockServer::start().await;
    let provider = SendGridProvider::new("SG.123").base_url(server.uri());

    let message = Message::new()
        .from(("Deal Desk", "deals@example.com"))
        .to(("Ana Ruiz", "ana@example.com"))
        .subject("Teaser")
        .html_body("<p>x</p>")
        .attachment(Attachment::from_bytes("teaser.pdf", b"PDF content".to_vec()));

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .and(body_json(json!({
            "personalizations": [{"to": [{"email": "ana@example.com", "name": "Ana Ruiz"}]}],
            "from": {"email": "deals@example.com", "name": "Deal Desk"},
            "subject": "Teaser",
            "content": [{"type": "text/html", "value": "<p>x</p>"}],
            "attachments": [{
                "content": "UERGIGNvbnRlbnQ=",
                "filename": "teaser.pdf",
                "type": "application/pdf",
                "disposition": "attachment"
            }]
        })))
        .respond_with(accepted_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(provider.send(&message).await.is_ok());
}

#[tokio::test]
async fn error_response_surfaces_first_error_message() {
    let server = MockServer::start().await;
    let provider = SendGridProvider::new("SG.123").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "The from email does not match a verified Sender Identity"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider.send(&valid_message()).await;
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("verified Sender Identity"));
}

#[tokio::test]
async fn missing_message_id_header_still_succeeds() {
    let server = MockServer::start().await;
    let provider = SendGridProvider::new("SG.123").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/mail/send"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let result = provider.send(&valid_message()).await;
    assert!(result.is_ok());
    assert!(!result.unwrap().message_id.is_empty());
}

#[test]
fn provider_name_is_sendgrid() {
    assert_eq!(SendGridProvider::new("SG.123").name(), "sendgrid");
}

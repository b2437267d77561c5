//! Logger provider that only logs messages.
//!
//! Useful for staging environments or when you want to see what would be
//! sent without actually sending or storing anything.

use async_trait::async_trait;

use crate::error::MailError;
use crate::message::Message;
use crate::provider::{Delivery, Provider};

/// Logger provider that emits tracing events for messages.
pub struct LoggerProvider {
    /// If true, log full message details. If false, just a recipient summary.
    log_full: bool,
}

impl LoggerProvider {
    /// Create a logger provider with brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger provider with full message details.
    pub fn full() -> Self {
        Self { log_full: true }
    }
}

impl Default for LoggerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for LoggerProvider {
    async fn send(&self, message: &Message) -> Result<Delivery, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?message.from.as_ref().map(|a| a.formatted()),
                to = ?message.to.as_ref().map(|a| a.formatted()),
                subject = %message.subject,
                has_html = message.html_body.is_some(),
                has_text = message.text_body.is_some(),
                attachments = message.attachments.len(),
                "Message logged (full)"
            );

            if let Some(ref text) = message.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = message.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?message.to.as_ref().map(|a| a.email.as_str()),
                subject = %message.subject,
                "Message logged"
            );
        }

        Ok(Delivery::new(message_id))
    }

    fn name(&self) -> &'static str {
        "logger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    #[tokio::test]
    async fn logger_brief() {
        let provider = LoggerProvider::new();

        let message = Message::new()
            .from(Address::new("deals@example.com"))
            .to(Address::new("target@example.com"))
            .subject("Test Subject")
            .text_body("Hello, World!");

        let delivery = provider.send(&message).await.unwrap();
        assert!(!delivery.message_id.is_empty());
    }

    #[tokio::test]
    async fn logger_full() {
        let provider = LoggerProvider::full();

        let message = Message::new()
            .from(Address::with_name("Deals", "deals@example.com"))
            .to(Address::new("target@example.com"))
            .subject("Test Subject")
            .text_body("Plain text")
            .html_body("<p>HTML</p>");

        assert!(provider.send(&message).await.is_ok());
    }

    #[test]
    fn provider_name() {
        assert_eq!(LoggerProvider::new().name(), "logger");
    }
}

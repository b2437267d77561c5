//! SendGrid API provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use outbound::providers::SendGridProvider;
//!
//! let provider = SendGridProvider::new("SG.xxxxx");
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::MailError;
use crate::message::Message;
use crate::provider::{Delivery, Provider};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

/// SendGrid API email provider.
pub struct SendGridProvider {
    api_key: String,
    client: Client,
    base_url: String,
}

impl SendGridProvider {
    /// Create a new SendGrid provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: SENDGRID_API_URL.to_string(),
        }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: SENDGRID_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(&self, message: &Message) -> Result<SendGridRequest, MailError> {
        let from = message.from.as_ref().ok_or(MailError::MissingField("from"))?;
        let to = message.to.as_ref().ok_or(MailError::MissingField("to"))?;

        let mut content = Vec::new();
        if let Some(ref text) = message.text_body {
            content.push(SendGridContent {
                content_type: "text/plain".to_string(),
                value: text.clone(),
            });
        }
        if let Some(ref html) = message.html_body {
            content.push(SendGridContent {
                content_type: "text/html".to_string(),
                value: html.clone(),
            });
        }

        let mut request = SendGridRequest {
            personalizations: vec![SendGridPersonalization {
                to: vec![SendGridAddress {
                    email: to.email.clone(),
                    name: to.name.clone(),
                }],
            }],
            from: SendGridAddress {
                email: from.email.clone(),
                name: from.name.clone(),
            },
            reply_to: message.reply_to.as_ref().map(|a| SendGridAddress {
                email: a.email.clone(),
                name: a.name.clone(),
            }),
            subject: message.subject.clone(),
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            attachments: None,
            headers: None,
        };

        if !message.attachments.is_empty() {
            request.attachments = Some(
                message
                    .attachments
                    .iter()
                    .map(|a| SendGridAttachment {
                        content: a.base64_data(),
                        filename: a.filename.clone(),
                        content_type: Some(a.content_type.clone()),
                        disposition: Some("attachment".to_string()),
                    })
                    .collect(),
            );
        }

        if !message.headers.is_empty() {
            request.headers = Some(message.headers.clone());
        }

        Ok(request)
    }
}

#[async_trait]
impl Provider for SendGridProvider {
    async fn send(&self, message: &Message) -> Result<Delivery, MailError> {
        let request = self.build_request(message)?;

        let url = format!("{}/mail/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("outbound/{}", crate::VERSION))
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            // SendGrid returns 202 with an empty body; the message id comes
            // back in the X-Message-Id header.
            let message_id = response
                .headers()
                .get("X-Message-Id")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            Ok(Delivery::with_response(
                message_id,
                serde_json::json!({ "provider": "sendgrid", "status": status.as_u16() }),
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("errors")?
                        .get(0)?
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(|s| s.to_string())
                })
                .unwrap_or(body);
            Err(MailError::provider_with_status(
                "sendgrid",
                message,
                status.as_u16(),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.trim().is_empty() {
            return Err(MailError::Configuration(
                "SendGrid API key is empty".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SendGrid API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<SendGridPersonalization>,
    from: SendGridAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<SendGridAddress>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<Vec<SendGridContent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<SendGridAttachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct SendGridPersonalization {
    to: Vec<SendGridAddress>,
}

#[derive(Debug, Serialize)]
struct SendGridAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String, // Base64 encoded
    filename: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disposition: Option<String>,
}

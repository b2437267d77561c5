//! Resend API provider.
//!
//! # Example
//!
//! ```rust,ignore
//! use outbound::providers::ResendProvider;
//!
//! let provider = ResendProvider::new("re_xxxxx");
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::message::Message;
use crate::provider::{Delivery, Provider};

const RESEND_API_URL: &str = "https://api.resend.com";

/// Resend API email provider.
pub struct ResendProvider {
    api_key: String,
    client: Client,
    base_url: String,
}

impl ResendProvider {
    /// Create a new Resend provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: RESEND_API_URL.to_string(),
        }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: RESEND_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn build_request(&self, message: &Message) -> Result<ResendRequest, MailError> {
        let from = message.from.as_ref().ok_or(MailError::MissingField("from"))?;
        let to = message.to.as_ref().ok_or(MailError::MissingField("to"))?;

        let mut request = ResendRequest {
            from: from.formatted(),
            to: vec![to.formatted()],
            subject: if message.subject.is_empty() {
                None
            } else {
                Some(message.subject.clone())
            },
            html: message.html_body.clone(),
            text: message.text_body.clone(),
            reply_to: message.reply_to.as_ref().map(|a| a.formatted()),
            headers: if message.headers.is_empty() {
                None
            } else {
                Some(
                    message
                        .headers
                        .iter()
                        .map(|(k, v)| ResendHeader {
                            name: k.clone(),
                            value: v.clone(),
                        })
                        .collect(),
                )
            },
            attachments: None,
        };

        if !message.attachments.is_empty() {
            let attachments: Vec<ResendAttachment> = message
                .attachments
                .iter()
                .map(|a| ResendAttachment {
                    filename: a.filename.clone(),
                    content: a.base64_data(),
                    content_type: Some(a.content_type.clone()),
                })
                .collect();
            request.attachments = Some(attachments);
        }

        Ok(request)
    }
}

#[async_trait]
impl Provider for ResendProvider {
    async fn send(&self, message: &Message) -> Result<Delivery, MailError> {
        let request = self.build_request(message)?;

        let url = format!("{}/emails", self.base_url);
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
            let result: ResendResponse = response.json().await?;
            Ok(Delivery::with_response(
                result.id,
                serde_json::json!({ "provider": "resend" }),
            ))
        } else {
            let error: ResendError = response.json().await.unwrap_or(ResendError {
                message: "Unknown error".to_string(),
                name: None,
            });
            Err(MailError::provider_with_status(
                "resend",
                error.message,
                status.as_u16(),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "resend"
    }

    fn validate_config(&self) -> Result<(), MailError> {
        if self.api_key.trim().is_empty() {
            return Err(MailError::Configuration(
                "Resend API key is empty".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Resend API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<Vec<ResendHeader>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<ResendAttachment>>,
}

#[derive(Debug, Serialize)]
struct ResendHeader {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ResendAttachment {
    filename: String,
    content: String, // Base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    message: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: Option<String>,
}

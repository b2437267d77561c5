//! Provider trait and delivery result types.
//!
//! # Architecture: Why `async_trait`?
//!
//! This module uses `#[async_trait]` instead of native async traits because
//! the crate requires dynamic dispatch via `Arc<dyn Provider>`: the concrete
//! adapter is resolved from configuration at call time (see
//! [`provider_from_env`](crate::provider_from_env)), so the queue processor
//! and the wave dispatcher hold trait objects. Native async traits are not
//! object-safe; the macro boxes futures to make them so. Email delivery is
//! network-bound, so the per-call heap allocation is unmeasurable next to
//! provider latency.
//!
//! Retry logic never lives in an adapter - the queue sender owns retries
//! (see [`queue::sender`](crate::queue::sender)).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::message::Message;

/// Result of a successful delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    /// Message ID assigned by the provider
    pub message_id: String,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl Delivery {
    /// Create a new delivery result with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: None,
        }
    }

    /// Create a delivery result with provider response.
    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: Some(response),
        }
    }
}

/// Trait for email delivery providers.
///
/// All providers (Resend, SendGrid, local capture, logger) implement this
/// trait. One call sends exactly one message; there is no batch endpoint in
/// this interface because every queue and campaign send is per-recipient.
///
/// # Example
///
/// ```ignore
/// use outbound::{Message, Provider};
/// use outbound::providers::ResendProvider;
///
/// let provider = ResendProvider::new("re_xxxxx");
///
/// let message = Message::new()
///     .from("deals@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .text_body("World");
///
/// let delivery = provider.send(&message).await?;
/// println!("Sent with ID: {}", delivery.message_id);
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a single message.
    ///
    /// Returns the provider-assigned message ID on success.
    async fn send(&self, message: &Message) -> Result<Delivery, MailError>;

    /// Get the provider name (for logging and queue row bookkeeping).
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Validate configuration.
    ///
    /// Called at startup to verify required configuration is present.
    /// Override in providers that require specific config (API keys, etc.).
    fn validate_config(&self) -> Result<(), MailError> {
        Ok(())
    }
}

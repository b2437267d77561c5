//! Local provider for development and testing.
//!
//! Captures messages in memory instead of sending them, so tests can assert
//! on what would have gone out. Supports failure injection for exercising
//! the retry and error paths.
//!
//! ```rust,ignore
//! use outbound::providers::LocalProvider;
//! use outbound::testing::*;
//!
//! #[tokio::test]
//! async fn sends_teaser() {
//!     let provider = LocalProvider::new();
//!
//!     // Code under test
//!     send_teaser(&provider, "target@example.com").await;
//!
//!     assert_message_sent(&provider);
//!     assert_message_to(&provider, "target@example.com");
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::MailError;
use crate::message::Message;
use crate::provider::{Delivery, Provider};

/// A message captured by [`LocalProvider`], with send metadata.
#[derive(Debug, Clone)]
pub struct CapturedMessage {
    /// Provider-assigned message id (a fresh UUID).
    pub message_id: String,
    /// The message as handed to the provider.
    pub message: Message,
    /// When the message was "sent" (captured).
    pub sent_at: DateTime<Utc>,
}

/// Local provider that captures messages in memory.
#[derive(Default)]
pub struct LocalProvider {
    captured: Arc<RwLock<Vec<CapturedMessage>>>,
    /// If set, send() will return this error (for testing error paths).
    fail_with: RwLock<Option<String>>,
}

impl LocalProvider {
    /// Create a new local provider with empty capture storage.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Configure the provider to fail every send with an error message.
    ///
    /// ```rust,ignore
    /// let provider = LocalProvider::new();
    /// provider.set_failure("rate limited");
    ///
    /// let result = provider.send(&message).await;
    /// assert!(result.is_err());
    /// ```
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.fail_with.write() = Some(message.into());
    }

    /// Clear the failure state.
    pub fn clear_failure(&self) {
        *self.fail_with.write() = None;
    }

    // =========================================================================
    // Message Access (for testing assertions)
    // =========================================================================

    /// Get all captured messages, oldest first.
    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.captured.read().clone()
    }

    /// Get the most recently captured message.
    pub fn last_message(&self) -> Option<CapturedMessage> {
        self.captured.read().last().cloned()
    }

    /// Number of captured messages.
    pub fn message_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Whether any message was captured.
    pub fn has_messages(&self) -> bool {
        !self.captured.read().is_empty()
    }

    /// Clear all captured messages.
    pub fn clear(&self) {
        self.captured.write().clear();
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn send(&self, message: &Message) -> Result<Delivery, MailError> {
        if let Some(reason) = self.fail_with.read().clone() {
            return Err(MailError::provider("local", reason));
        }

        let message_id = uuid::Uuid::new_v4().to_string();
        self.captured.write().push(CapturedMessage {
            message_id: message_id.clone(),
            message: message.clone(),
            sent_at: Utc::now(),
        });

        Ok(Delivery::new(message_id))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

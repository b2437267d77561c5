//! Queue item model and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailError;
use crate::message::Message;

/// Lifecycle of a queue item.
///
/// Transitions run only forward, `{Pending | Queued}` into one of the
/// terminal states, with a single exception: `Failed` may return to
/// `Pending` through an explicit retry, gated by a cooldown on the row's
/// `updated_at` (see [`RetryPolicy`](crate::queue::RetryPolicy)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Waiting to be attempted (or re-attempted after backoff).
    Pending,
    /// Claimed by a processing pass.
    Queued,
    /// Delivered; the provider accepted the message.
    Sent,
    /// Gave up: `attempts` reached `max_attempts`, or a caller forced it.
    Failed,
    /// Withdrawn before delivery.
    Cancelled,
}

impl QueueStatus {
    /// Whether this status admits no further transitions (retry aside).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving to `next`.
    ///
    /// `Failed -> Pending` is allowed here; the cooldown guard lives with
    /// the caller so the allowed edges stay independently testable.
    pub fn can_transition_to(self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        match (self, next) {
            // Re-scheduling a retry keeps the row pending.
            (Pending, Pending) => true,
            (Pending, Queued | Sent | Failed | Cancelled) => true,
            (Queued, Pending | Sent | Failed | Cancelled) => true,
            (Failed, Pending) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier.
    pub id: String,
    /// Category tag (e.g. "transactional", "digest", "teaser").
    pub queue_type: String,

    /// Addressing, content, headers, and free-form metadata.
    pub message: Message,

    /// Lifecycle status.
    pub status: QueueStatus,
    /// Lower = more urgent. Default 5.
    pub priority: i32,
    /// Do not attempt before this time.
    pub scheduled_at: Option<DateTime<Utc>>,

    // Retry bookkeeping
    /// Attempts made so far. Never exceeds `max_attempts`.
    pub attempts: u32,
    /// Attempt cap. Default 3.
    pub max_attempts: u32,
    /// Earliest time of the next retry, set by the backoff ladder.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Human-readable reason for the last failure.
    pub last_error: Option<String>,
    /// Structured detail for the last failure (opaque JSON).
    pub error_details: Option<serde_json::Value>,

    // Provider result
    /// Adapter name that handled (or will handle) this item.
    pub provider: String,
    /// Provider-assigned message id, once sent.
    pub provider_message_id: Option<String>,
    /// Provider-reported status string, if any.
    pub provider_status: Option<String>,
    /// Raw provider response (opaque JSON).
    pub provider_response: Option<serde_json::Value>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,

    // Link back to the originating entity (mandate, proposal, ...)
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_by: Option<String>,
}

impl QueueItem {
    /// Whether the item is due for an attempt at `now`: pending, past its
    /// schedule, and past any retry backoff.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending
            && self.scheduled_at.map_or(true, |at| at <= now)
            && self.next_retry_at.map_or(true, |at| at <= now)
    }
}

/// Input to [`QueueStore::enqueue`](crate::queue::QueueStore::enqueue).
///
/// Omitted fields get defaults at enqueue time: priority 5, max_attempts 3,
/// provider from the caller's configuration.
///
/// ```
/// use outbound::{Enqueue, Message};
///
/// let enqueue = Enqueue::new(
///     Message::new()
///         .to("a@b.com")
///         .subject("Hi")
///         .html_body("<p>x</p>"),
/// )
/// .queue_type("teaser")
/// .priority(1)
/// .reference("mandate", "m-42");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Enqueue {
    pub message: Message,
    pub queue_type: Option<String>,
    pub priority: Option<i32>,
    pub max_attempts: Option<u32>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub provider: Option<String>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_by: Option<String>,
}

impl Enqueue {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }

    pub fn queue_type(mut self, queue_type: impl Into<String>) -> Self {
        self.queue_type = Some(queue_type.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn reference(mut self, kind: impl Into<String>, id: impl Into<String>) -> Self {
        self.reference_type = Some(kind.into());
        self.reference_id = Some(id.into());
        self
    }

    pub fn created_by(mut self, who: impl Into<String>) -> Self {
        self.created_by = Some(who.into());
        self
    }
}

/// Filter for [`QueueStore::fetch`](crate::queue::QueueStore::fetch).
#[derive(Debug, Clone, Default)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
    pub queue_type: Option<String>,
    /// Substring match against the recipient email.
    pub recipient_contains: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl QueueFilter {
    pub fn matches(&self, item: &QueueItem) -> bool {
        if let Some(status) = self.status {
            if item.status != status {
                return false;
            }
        }
        if let Some(ref queue_type) = self.queue_type {
            if &item.queue_type != queue_type {
                return false;
            }
        }
        if let Some(ref needle) = self.recipient_contains {
            let found = item
                .message
                .to
                .as_ref()
                .map(|a| a.email.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false);
            if !found {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if item.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if item.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Field-scoped patch for a queue row.
///
/// Only set fields are written; `updated_at` is stamped on every apply.
/// The outcome constructors produce the three shapes the sender writes.
#[derive(Debug, Clone, Default)]
pub struct QueueUpdate {
    pub status: Option<QueueStatus>,
    pub priority: Option<i32>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub attempts: Option<u32>,
    /// `Some(None)` clears the retry schedule.
    pub next_retry_at: Option<Option<DateTime<Utc>>>,
    pub last_error: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub provider_message_id: Option<String>,
    pub provider_status: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub queued_at: Option<DateTime<Utc>>,
    pub first_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl QueueUpdate {
    /// Successful delivery: mark sent and record the provider result.
    pub fn sent(delivery: &crate::provider::Delivery, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(QueueStatus::Sent),
            sent_at: Some(now),
            last_attempt_at: Some(now),
            next_retry_at: Some(None),
            provider_message_id: Some(delivery.message_id.clone()),
            provider_status: Some("accepted".into()),
            provider_response: delivery.provider_response.clone(),
            ..Self::default()
        }
    }

    /// Failed attempt with retries remaining: back to pending with a
    /// scheduled retry.
    pub fn retry_scheduled(
        attempts: u32,
        error: &MailError,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: Some(QueueStatus::Pending),
            attempts: Some(attempts),
            next_retry_at: Some(Some(next_retry_at)),
            last_error: Some(error.to_string()),
            error_details: Some(serde_json::json!({ "error": error.to_string() })),
            last_attempt_at: Some(now),
            ..Self::default()
        }
    }

    /// Failed attempt at the cap (or a non-retryable error): terminal.
    pub fn failed(attempts: u32, error: &MailError, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(QueueStatus::Failed),
            attempts: Some(attempts),
            next_retry_at: Some(None),
            last_error: Some(error.to_string()),
            error_details: Some(serde_json::json!({ "error": error.to_string() })),
            last_attempt_at: Some(now),
            failed_at: Some(now),
            ..Self::default()
        }
    }

    /// Apply the patch to an item, stamping `updated_at`.
    pub(crate) fn apply_to(&self, item: &mut QueueItem, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(at) = self.scheduled_at {
            item.scheduled_at = Some(at);
        }
        if let Some(attempts) = self.attempts {
            item.attempts = attempts;
        }
        if let Some(next_retry_at) = self.next_retry_at {
            item.next_retry_at = next_retry_at;
        }
        if let Some(ref err) = self.last_error {
            item.last_error = Some(err.clone());
        }
        if let Some(ref details) = self.error_details {
            item.error_details = Some(details.clone());
        }
        if let Some(ref id) = self.provider_message_id {
            item.provider_message_id = Some(id.clone());
        }
        if let Some(ref status) = self.provider_status {
            item.provider_status = Some(status.clone());
        }
        if let Some(ref response) = self.provider_response {
            item.provider_response = Some(response.clone());
        }
        if let Some(at) = self.queued_at {
            item.queued_at = Some(at);
        }
        if let Some(at) = self.first_attempt_at {
            item.first_attempt_at.get_or_insert(at);
        }
        if let Some(at) = self.last_attempt_at {
            item.last_attempt_at = Some(at);
        }
        if let Some(at) = self.sent_at {
            item.sent_at = Some(at);
        }
        if let Some(at) = self.failed_at {
            item.failed_at = Some(at);
        }
        item.updated_at = now;
    }
}

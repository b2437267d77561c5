//! Single-message sender: one provider call, one store write.
//!
//! The sender owns the retry/backoff policy. Adapters never retry; the
//! queue row records every outcome so repeated sends stay observable and
//! auditable.

use chrono::{DateTime, Duration, Utc};

use crate::error::MailError;
use crate::message::Message;
use crate::provider::{Delivery, Provider};

#[cfg(feature = "metrics")]
use std::time::Instant;

use super::model::{QueueItem, QueueStatus, QueueUpdate};
use super::store::QueueStore;

/// Retry and cooldown constants.
///
/// The defaults are product-chosen: a 60s / 300s / 1800s backoff ladder
/// (capped at the last rung for any further attempts up to the cap), a
/// 2-minute cooldown on manual single-item retries, and a 5-minute cooldown
/// on bulk retries. All are tunable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff ladder indexed by attempt number (1-based, clamped to the
    /// last rung).
    pub backoff: Vec<Duration>,
    /// Minimum age of a failed row before a manual single-item retry.
    pub single_retry_cooldown: Duration,
    /// Minimum age of a failed row before a bulk retry picks it up.
    pub bulk_retry_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: vec![
                Duration::seconds(60),
                Duration::seconds(300),
                Duration::seconds(1800),
            ],
            single_retry_cooldown: Duration::minutes(2),
            bulk_retry_cooldown: Duration::minutes(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the attempt count after the
    /// failure that was just recorded.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let idx = (attempts.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or(Duration::seconds(60))
    }
}

/// Outcome of one send attempt.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The provider accepted the message.
    Sent { message_id: String },
    /// The attempt failed; another is scheduled.
    Retrying {
        attempts: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// The attempt failed terminally (cap reached or non-retryable error).
    Failed { error: MailError },
}

/// Sends one queued item (or one ephemeral message) through a provider and
/// writes the outcome back.
pub struct QueueSender<'a> {
    store: &'a dyn QueueStore,
    provider: &'a dyn Provider,
    policy: &'a RetryPolicy,
    default_from: Option<crate::Address>,
}

impl<'a> QueueSender<'a> {
    pub fn new(
        store: &'a dyn QueueStore,
        provider: &'a dyn Provider,
        policy: &'a RetryPolicy,
    ) -> Self {
        Self {
            store,
            provider,
            policy,
            default_from: None,
        }
    }

    /// Sender address applied when the queued message has none.
    pub fn default_from(mut self, from: crate::Address) -> Self {
        self.default_from = Some(from);
        self
    }

    /// Attempt delivery of one queue item.
    ///
    /// Exactly one store update is written regardless of outcome:
    /// - success marks the row `sent` with the provider result;
    /// - a retryable failure under the cap re-schedules via the backoff
    ///   ladder and returns the row to `pending`;
    /// - a failure at the cap, or a non-retryable one (bad input), marks
    ///   the row `failed`.
    ///
    /// The provider is called at most once per invocation.
    pub async fn send_one(&self, item: &QueueItem) -> Result<SendOutcome, MailError> {
        let span = tracing::info_span!(
            "outbound.send_one",
            item_id = %item.id,
            provider = self.provider.name(),
            attempt = item.attempts + 1,
        );
        let _guard = span.enter();

        let now = Utc::now();
        let claimable = [QueueStatus::Pending, QueueStatus::Queued];

        let mut message = item.message.clone();
        if message.from.is_none() {
            message.from = self.default_from.clone();
        }

        // Bad input cannot be fixed by retrying; fail the row without
        // touching the provider.
        if let Err(err) = message.validate() {
            tracing::warn!(error = %err, "Queued message failed validation");
            let update = QueueUpdate::failed(item.attempts, &err, now);
            self.store.apply(&item.id, &claimable, update).await?;
            return Ok(SendOutcome::Failed { error: err });
        }

        #[cfg(feature = "metrics")]
        let start = Instant::now();

        let result = self.provider.send(&message).await;

        #[cfg(feature = "metrics")]
        {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics::counter!(
                "outbound_emails_total",
                "provider" => self.provider.name(), "status" => status
            )
            .increment(1);
            metrics::histogram!(
                "outbound_delivery_duration_seconds",
                "provider" => self.provider.name()
            )
            .record(start.elapsed().as_secs_f64());
        }

        match result {
            Ok(delivery) => {
                tracing::info!(message_id = %delivery.message_id, "Email delivered");
                let mut update = QueueUpdate::sent(&delivery, now);
                update.first_attempt_at = Some(now);
                self.store.apply(&item.id, &claimable, update).await?;
                Ok(SendOutcome::Sent {
                    message_id: delivery.message_id,
                })
            }
            Err(err) => {
                // attempts never exceeds max_attempts; at the cap the row
                // goes terminal.
                let attempts = (item.attempts + 1).min(item.max_attempts);
                if attempts >= item.max_attempts || !err.is_retryable() {
                    tracing::error!(error = %err, attempts, "Email delivery failed permanently");
                    let mut update = QueueUpdate::failed(attempts, &err, now);
                    update.first_attempt_at = Some(now);
                    self.store.apply(&item.id, &claimable, update).await?;
                    Ok(SendOutcome::Failed { error: err })
                } else {
                    let next_retry_at = now + self.policy.backoff_for(attempts);
                    tracing::warn!(
                        error = %err,
                        attempts,
                        next_retry_at = %next_retry_at,
                        "Email delivery failed, retry scheduled"
                    );
                    let mut update = QueueUpdate::retry_scheduled(attempts, &err, next_retry_at, now);
                    update.first_attempt_at = Some(now);
                    self.store.apply(&item.id, &claimable, update).await?;
                    Ok(SendOutcome::Retrying {
                        attempts,
                        next_retry_at,
                    })
                }
            }
        }
    }

    /// Send an ephemeral message that has no queue row (the synchronous
    /// single-send path). Validation failures are rejected with no side
    /// effects; no retry bookkeeping applies.
    pub async fn send_message(&self, message: &Message) -> Result<Delivery, MailError> {
        let mut message = message.clone();
        if message.from.is_none() {
            message.from = self.default_from.clone();
        }
        message.validate()?;

        let span = tracing::info_span!(
            "outbound.send_message",
            provider = self.provider.name(),
            to = message.to.as_ref().map(|a| a.email.as_str()),
            subject = %message.subject,
        );
        let _guard = span.enter();

        let result = self.provider.send(&message).await;
        match &result {
            Ok(delivery) => tracing::info!(message_id = %delivery.message_id, "Email delivered"),
            Err(err) => tracing::error!(error = %err, "Email delivery failed"),
        }
        result
    }
}

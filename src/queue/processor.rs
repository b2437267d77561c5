//! Batch queue processor: one bounded, idempotent pass over due rows.
//!
//! Safe to invoke repeatedly and concurrently (e.g. from a periodic
//! trigger): the due-query excludes rows that have already gone terminal,
//! and every row write is conditional on the current status, so two racing
//! passes cannot double-send an item.

use chrono::Utc;

use crate::error::MailError;
use crate::provider::Provider;
use crate::Address;

use super::model::QueueItem;
use super::sender::{QueueSender, RetryPolicy, SendOutcome};
use super::store::QueueStore;

/// Default page size for one processing pass.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Aggregate counts from one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows attempted this pass.
    pub processed: usize,
    /// Rows delivered.
    pub sent: usize,
    /// Rows that went terminal-failed.
    pub failed: usize,
    /// Rows re-scheduled for a later retry.
    pub rescheduled: usize,
}

/// Processes pages of due queue rows through a provider.
pub struct QueueProcessor<'a> {
    store: &'a dyn QueueStore,
    provider: &'a dyn Provider,
    policy: RetryPolicy,
    batch_size: usize,
    default_from: Option<Address>,
}

impl<'a> QueueProcessor<'a> {
    pub fn new(store: &'a dyn QueueStore, provider: &'a dyn Provider) -> Self {
        Self {
            store,
            provider,
            policy: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            default_from: None,
        }
    }

    /// Override the retry policy (backoff ladder and cooldowns).
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cap on rows pulled per pass.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sender address applied when a queued message has none.
    pub fn default_from(mut self, from: Address) -> Self {
        self.default_from = Some(from);
        self
    }

    /// Pull one page of due rows (pending, schedule and backoff elapsed,
    /// priority order) and attempt each through the sender.
    ///
    /// Rows are attempted serially; ordering across messages is not
    /// guaranteed beyond "due items are eventually attempted". A row
    /// claimed by a concurrent pass surfaces as a conditional-write
    /// conflict and is skipped, not an error.
    pub async fn process_due(&self) -> Result<BatchOutcome, MailError> {
        let due = self.store.due(Utc::now(), self.batch_size).await?;
        tracing::debug!(due = due.len(), "Processing due queue items");

        let mut sender = QueueSender::new(self.store, self.provider, &self.policy);
        if let Some(ref from) = self.default_from {
            sender = sender.default_from(from.clone());
        }

        let mut outcome = BatchOutcome::default();
        for item in &due {
            match sender.send_one(item).await {
                Ok(SendOutcome::Sent { .. }) => {
                    outcome.processed += 1;
                    outcome.sent += 1;
                }
                Ok(SendOutcome::Failed { .. }) => {
                    outcome.processed += 1;
                    outcome.failed += 1;
                }
                Ok(SendOutcome::Retrying { .. }) => {
                    outcome.processed += 1;
                    outcome.rescheduled += 1;
                }
                Err(MailError::InvalidTransition { .. }) => {
                    // Another pass got here first; its write wins.
                    tracing::debug!(item_id = %item.id, "Skipping item claimed by concurrent pass");
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(
            processed = outcome.processed,
            sent = outcome.sent,
            failed = outcome.failed,
            rescheduled = outcome.rescheduled,
            "Queue pass complete"
        );
        Ok(outcome)
    }

    /// Manual retry of one failed item, gated by the single-item cooldown
    /// (default 2 minutes since the row's last update). Re-arms the
    /// attempt budget.
    pub async fn retry_item(&self, id: &str) -> Result<QueueItem, MailError> {
        self.store.retry(id, self.policy.single_retry_cooldown).await
    }

    /// Bulk retry of failed items, gated by the bulk cooldown (default
    /// 5 minutes) and `attempts < max_attempts`. Ineligible rows are
    /// skipped. Returns the re-queued items.
    pub async fn retry_all_failed(&self) -> Result<Vec<QueueItem>, MailError> {
        let requeued = self.store.retry_failed(self.policy.bulk_retry_cooldown).await?;
        if !requeued.is_empty() {
            tracing::info!(count = requeued.len(), "Re-queued failed items");
        }
        Ok(requeued)
    }
}

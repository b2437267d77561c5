//! Queue store trait and the in-memory implementation.
//!
//! The store is the source of truth: callers never cache rows, and all
//! writes are field-scoped conditional updates gated on the current status.
//! Production deployments back this trait with a database table; the
//! in-memory implementation serves development and tests and defines the
//! contract's semantics.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::MailError;

use super::model::{Enqueue, QueueFilter, QueueItem, QueueStatus, QueueUpdate};

/// Default priority assigned when the caller omits one. Lower = more urgent.
pub(crate) const DEFAULT_PRIORITY: i32 = 5;
/// Default attempt cap.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Persistence contract for the outbound queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new item, assigning defaults for omitted fields
    /// (priority 5, max_attempts 3, the store's default provider).
    async fn enqueue(&self, enqueue: Enqueue) -> Result<QueueItem, MailError>;

    /// Fetch one item by id.
    async fn get(&self, id: &str) -> Result<Option<QueueItem>, MailError>;

    /// Filtered, paginated read. `page` is zero-based. Returns the page of
    /// items plus the total match count for UI pagination — never an
    /// unbounded scan.
    async fn fetch(
        &self,
        filter: &QueueFilter,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<QueueItem>, usize), MailError>;

    /// Items due for an attempt at `now`: pending, schedule and backoff
    /// elapsed, ordered by priority then created_at, capped at `limit`.
    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueItem>, MailError>;

    /// Conditional, field-scoped update. The write succeeds only when the
    /// row's current status is in `expected` (empty = any) and the patch's
    /// status change, if present, is an allowed transition. `updated_at` is
    /// stamped on success.
    async fn apply(
        &self,
        id: &str,
        expected: &[QueueStatus],
        update: QueueUpdate,
    ) -> Result<QueueItem, MailError>;

    /// Withdraw an item. Only pending or queued rows can be cancelled.
    async fn cancel(&self, id: &str) -> Result<QueueItem, MailError>;

    /// Hard delete. Used only for retention cleanup.
    async fn delete(&self, ids: &[String]) -> Result<usize, MailError>;

    /// Retention cleanup: drop sent/cancelled rows older than `days` days.
    async fn purge_terminal_older_than(&self, days: i64) -> Result<usize, MailError>;

    /// Manual retry of one failed item. Requires the row to have been
    /// untouched for at least `min_age` (cooldown against operator
    /// double-clicks and racing triggers); resets the attempt budget.
    async fn retry(&self, id: &str, min_age: Duration) -> Result<QueueItem, MailError>;

    /// Bulk retry of failed items untouched for at least `min_age` and
    /// still under their attempt cap. Ineligible rows are skipped, not
    /// errors. Returns the re-queued items.
    async fn retry_failed(&self, min_age: Duration) -> Result<Vec<QueueItem>, MailError>;
}

/// Thread-safe in-memory queue store.
///
/// Keeps rows in a map plus an insertion-order index, with every operation
/// under one lock so conditional updates are atomic.
pub struct MemoryQueueStore {
    inner: RwLock<Inner>,
    default_provider: String,
}

#[derive(Default)]
struct Inner {
    items: HashMap<String, QueueItem>,
    /// Insertion order of ids, for stable created_at tiebreaks.
    order: Vec<String>,
}

impl MemoryQueueStore {
    /// Create an empty store with "local" as the default provider.
    pub fn new() -> Self {
        Self::with_default_provider("local")
    }

    /// Create an empty store with an explicit default provider name.
    pub fn with_default_provider(provider: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            default_provider: provider.into(),
        }
    }

    /// Create a store wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of rows, any status.
    pub fn count(&self) -> usize {
        self.inner.read().items.len()
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, enqueue: Enqueue) -> Result<QueueItem, MailError> {
        let now = Utc::now();
        let item = QueueItem {
            id: uuid::Uuid::new_v4().to_string(),
            queue_type: enqueue
                .queue_type
                .unwrap_or_else(|| "transactional".to_string()),
            message: enqueue.message,
            status: QueueStatus::Pending,
            priority: enqueue.priority.unwrap_or(DEFAULT_PRIORITY),
            scheduled_at: enqueue.scheduled_at,
            attempts: 0,
            max_attempts: enqueue.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            next_retry_at: None,
            last_error: None,
            error_details: None,
            provider: enqueue
                .provider
                .unwrap_or_else(|| self.default_provider.clone()),
            provider_message_id: None,
            provider_status: None,
            provider_response: None,
            created_at: now,
            updated_at: now,
            queued_at: None,
            first_attempt_at: None,
            last_attempt_at: None,
            sent_at: None,
            failed_at: None,
            reference_id: enqueue.reference_id,
            reference_type: enqueue.reference_type,
            created_by: enqueue.created_by,
        };

        let mut inner = self.inner.write();
        inner.order.push(item.id.clone());
        inner.items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn get(&self, id: &str) -> Result<Option<QueueItem>, MailError> {
        Ok(self.inner.read().items.get(id).cloned())
    }

    async fn fetch(
        &self,
        filter: &QueueFilter,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<QueueItem>, usize), MailError> {
        let inner = self.inner.read();
        let matched: Vec<QueueItem> = inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id))
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok((items, total))
    }

    async fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueItem>, MailError> {
        let inner = self.inner.read();
        let mut due: Vec<QueueItem> = inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id))
            .filter(|item| item.is_due(now))
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn apply(
        &self,
        id: &str,
        expected: &[QueueStatus],
        update: QueueUpdate,
    ) -> Result<QueueItem, MailError> {
        let mut inner = self.inner.write();
        let item = inner
            .items
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("queue item {id}")))?;

        if !expected.is_empty() && !expected.contains(&item.status) {
            return Err(MailError::InvalidTransition {
                entity: "queue_item",
                from: item.status.to_string(),
                to: update
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "(no status change)".into()),
            });
        }
        if let Some(next) = update.status {
            if !item.status.can_transition_to(next) {
                return Err(MailError::InvalidTransition {
                    entity: "queue_item",
                    from: item.status.to_string(),
                    to: next.to_string(),
                });
            }
        }

        update.apply_to(item, Utc::now());
        Ok(item.clone())
    }

    async fn cancel(&self, id: &str) -> Result<QueueItem, MailError> {
        self.apply(
            id,
            &[QueueStatus::Pending, QueueStatus::Queued],
            QueueUpdate {
                status: Some(QueueStatus::Cancelled),
                ..QueueUpdate::default()
            },
        )
        .await
    }

    async fn delete(&self, ids: &[String]) -> Result<usize, MailError> {
        let mut inner = self.inner.write();
        let Inner { items, order } = &mut *inner;
        let mut removed = 0;
        for id in ids {
            if items.remove(id).is_some() {
                removed += 1;
            }
        }
        order.retain(|id| items.contains_key(id));
        Ok(removed)
    }

    async fn purge_terminal_older_than(&self, days: i64) -> Result<usize, MailError> {
        let cutoff = Utc::now() - Duration::days(days);
        let ids: Vec<String> = {
            let inner = self.inner.read();
            inner
                .items
                .values()
                .filter(|item| {
                    matches!(item.status, QueueStatus::Sent | QueueStatus::Cancelled)
                        && item.created_at < cutoff
                })
                .map(|item| item.id.clone())
                .collect()
        };
        self.delete(&ids).await
    }

    async fn retry(&self, id: &str, min_age: Duration) -> Result<QueueItem, MailError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let item = inner
            .items
            .get_mut(id)
            .ok_or_else(|| MailError::NotFound(format!("queue item {id}")))?;

        if item.status != QueueStatus::Failed {
            return Err(MailError::InvalidTransition {
                entity: "queue_item",
                from: item.status.to_string(),
                to: QueueStatus::Pending.to_string(),
            });
        }
        let age = now - item.updated_at;
        if age < min_age {
            return Err(MailError::RetryCooldown(format!(
                "item {id} updated {}s ago, cooldown is {}s",
                age.num_seconds(),
                min_age.num_seconds()
            )));
        }

        item.status = QueueStatus::Pending;
        item.attempts = 0;
        item.next_retry_at = None;
        item.failed_at = None;
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn retry_failed(&self, min_age: Duration) -> Result<Vec<QueueItem>, MailError> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let mut requeued = Vec::new();

        let ids: Vec<String> = inner.order.clone();
        for id in ids {
            let Some(item) = inner.items.get_mut(&id) else {
                continue;
            };
            if item.status != QueueStatus::Failed
                || item.attempts >= item.max_attempts
                || now - item.updated_at < min_age
            {
                continue;
            }
            item.status = QueueStatus::Pending;
            item.next_retry_at = None;
            item.failed_at = None;
            item.updated_at = now;
            requeued.push(item.clone());
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn teaser(to: &str) -> Enqueue {
        Enqueue::new(
            Message::new()
                .from("deals@example.com")
                .to(to)
                .subject("Teaser")
                .html_body("<p>x</p>"),
        )
    }

    #[tokio::test]
    async fn enqueue_assigns_defaults() {
        let store = MemoryQueueStore::new();
        let item = store.enqueue(teaser("a@b.com")).await.unwrap();

        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.priority, 5);
        assert_eq!(item.max_attempts, 3);
        assert_eq!(item.attempts, 0);
        assert_eq!(item.provider, "local");
        assert_eq!(item.queue_type, "transactional");
    }

    #[tokio::test]
    async fn fetch_filters_and_paginates() {
        let store = MemoryQueueStore::new();
        for i in 0..5 {
            store
                .enqueue(teaser(&format!("target{i}@andes.example")))
                .await
                .unwrap();
        }
        store.enqueue(teaser("other@elsewhere.example")).await.unwrap();

        let filter = QueueFilter {
            recipient_contains: Some("andes".into()),
            ..QueueFilter::default()
        };
        let (page0, total) = store.fetch(&filter, 0, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page0.len(), 2);

        let (page2, _) = store.fetch(&filter, 2, 2).await.unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[tokio::test]
    async fn due_orders_by_priority_then_age() {
        let store = MemoryQueueStore::new();
        let low = store
            .enqueue(teaser("low@x.com").priority(9))
            .await
            .unwrap();
        let urgent = store
            .enqueue(teaser("urgent@x.com").priority(1))
            .await
            .unwrap();
        let normal = store.enqueue(teaser("normal@x.com")).await.unwrap();

        let due = store.due(Utc::now(), 10).await.unwrap();
        let ids: Vec<&str> = due.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![&urgent.id, &normal.id, &low.id]);
    }

    #[tokio::test]
    async fn scheduled_items_are_not_due_early() {
        let store = MemoryQueueStore::new();
        store
            .enqueue(teaser("later@x.com").scheduled_at(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert!(store.due(Utc::now(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_only_from_pending_or_queued() {
        let store = MemoryQueueStore::new();
        let item = store.enqueue(teaser("a@b.com")).await.unwrap();
        let cancelled = store.cancel(&item.id).await.unwrap();
        assert_eq!(cancelled.status, QueueStatus::Cancelled);

        // Cancelling again is an invalid transition.
        assert!(store.cancel(&item.id).await.is_err());
    }

    #[tokio::test]
    async fn apply_rejects_status_mismatch() {
        let store = MemoryQueueStore::new();
        let item = store.enqueue(teaser("a@b.com")).await.unwrap();
        store.cancel(&item.id).await.unwrap();

        let result = store
            .apply(
                &item.id,
                &[QueueStatus::Pending],
                QueueUpdate {
                    status: Some(QueueStatus::Queued),
                    ..QueueUpdate::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(MailError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn retry_requires_failed_status() {
        let store = MemoryQueueStore::new();
        let item = store.enqueue(teaser("a@b.com")).await.unwrap();
        assert!(store.retry(&item.id, Duration::zero()).await.is_err());
    }

    #[tokio::test]
    async fn purge_drops_only_old_terminal_rows() {
        let store = MemoryQueueStore::new();
        let sent = store.enqueue(teaser("a@b.com")).await.unwrap();
        let pending = store.enqueue(teaser("b@b.com")).await.unwrap();

        // Mark one sent and age it past the cutoff.
        {
            let mut inner = store.inner.write();
            let row = inner.items.get_mut(&sent.id).unwrap();
            row.status = QueueStatus::Sent;
            row.created_at = Utc::now() - Duration::days(40);
        }

        let removed = store.purge_terminal_older_than(30).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&sent.id).await.unwrap().is_none());
        assert!(store.get(&pending.id).await.unwrap().is_some());
    }
}

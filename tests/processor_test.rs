//! Batch queue processor tests: idempotence, aggregate counts, ordering.

use chrono::{Duration, Utc};
use outbound::providers::LocalProvider;
use outbound::queue::{MemoryQueueStore, QueueProcessor, QueueStore};
use outbound::testing::*;
use outbound::{Enqueue, Message, QueueStatus};

fn teaser(to: &str) -> Message {
    Message::new()
        .from("deals@example.com")
        .to(to)
        .subject("Teaser: Project Andes")
        .html_body("<p>Please find attached.</p>")
}

#[tokio::test]
async fn enqueued_message_is_sent_end_to_end() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();

    let item = store
        .enqueue(Enqueue::new(
            Message::new()
                .from("deals@example.com")
                .to("a@b.com")
                .subject("Hi")
                .html_body("<p>x</p>"),
        ))
        .await
        .unwrap();

    let outcome = QueueProcessor::new(&store, &provider)
        .process_due()
        .await
        .unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.failed, 0);

    let item = store.get(&item.id).await.unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Sent);
    assert!(item.provider_message_id.is_some());
    assert!(item.sent_at.is_some());

    assert_message_sent(&provider);
    assert_message_to(&provider, "a@b.com");
}

#[tokio::test]
async fn processing_twice_does_not_double_send() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider);

    store.enqueue(Enqueue::new(teaser("a@b.com"))).await.unwrap();

    let first = processor.process_due().await.unwrap();
    assert_eq!(first.sent, 1);

    // Sent items leave the due-query; a second pass finds nothing.
    let second = processor.process_due().await.unwrap();
    assert_eq!(second.processed, 0);
    assert_message_count(&provider, 1);
}

#[tokio::test]
async fn aggregate_counts_cover_all_outcomes() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider);

    store.enqueue(Enqueue::new(teaser("ok@x.com"))).await.unwrap();
    // Fails validation: no body.
    store
        .enqueue(Enqueue::new(
            Message::new().from("deals@example.com").to("bad@x.com").subject("Hi"),
        ))
        .await
        .unwrap();

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 2);
    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.rescheduled, 0);
}

#[tokio::test]
async fn failing_provider_reschedules_then_pass_leaves_them_alone() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    provider.set_failure("down");
    let processor = QueueProcessor::new(&store, &provider);

    store.enqueue(Enqueue::new(teaser("a@x.com"))).await.unwrap();

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.rescheduled, 1);

    // The item now has a future next_retry_at and is no longer due.
    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 0);
}

#[tokio::test]
async fn batch_size_bounds_one_pass() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider).batch_size(2);

    for i in 0..5 {
        store
            .enqueue(Enqueue::new(teaser(&format!("t{i}@x.com"))))
            .await
            .unwrap();
    }

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 2);

    // Remaining items are picked up by subsequent passes.
    processor.process_due().await.unwrap();
    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 1);
    assert_message_count(&provider, 5);
}

#[tokio::test]
async fn priority_order_wins_over_insertion_order() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider).batch_size(1);

    store
        .enqueue(Enqueue::new(teaser("routine@x.com")))
        .await
        .unwrap();
    store
        .enqueue(Enqueue::new(teaser("urgent@x.com")).priority(1))
        .await
        .unwrap();

    processor.process_due().await.unwrap();
    assert_eq!(
        provider.last_message().unwrap().message.to.unwrap().email,
        "urgent@x.com"
    );
}

#[tokio::test]
async fn scheduled_items_wait_their_turn() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider);

    store
        .enqueue(Enqueue::new(teaser("later@x.com")).scheduled_at(Utc::now() + Duration::hours(2)))
        .await
        .unwrap();

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 0);
    assert_no_messages_sent(&provider);
}

#[tokio::test]
async fn cancelled_items_are_never_processed() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider);

    let item = store.enqueue(Enqueue::new(teaser("a@x.com"))).await.unwrap();
    store.cancel(&item.id).await.unwrap();

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.processed, 0);
    assert_no_messages_sent(&provider);
}

#[tokio::test]
async fn default_from_is_applied_to_queued_messages() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider)
        .default_from(outbound::Address::with_name("Deal Desk", "deals@example.com"));

    store
        .enqueue(Enqueue::new(
            Message::new().to("a@b.com").subject("Hi").html_body("<p>x</p>"),
        ))
        .await
        .unwrap();

    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.sent, 1);
    let from = provider.last_message().unwrap().message.from.unwrap();
    assert_eq!(from.email, "deals@example.com");
}

#[tokio::test]
async fn manual_retry_runs_through_the_processor_again() {
    let store = MemoryQueueStore::new();
    let provider = LocalProvider::new();
    let processor = QueueProcessor::new(&store, &provider).policy(outbound::RetryPolicy {
        single_retry_cooldown: Duration::zero(),
        ..outbound::RetryPolicy::default()
    });

    let item = store
        .enqueue(Enqueue::new(teaser("a@x.com")).max_attempts(1))
        .await
        .unwrap();

    provider.set_failure("down");
    processor.process_due().await.unwrap();
    assert_eq!(
        store.get(&item.id).await.unwrap().unwrap().status,
        QueueStatus::Failed
    );

    // Operator retries once the outage is over.
    processor.retry_item(&item.id).await.unwrap();
    provider.clear_failure();
    let outcome = processor.process_due().await.unwrap();
    assert_eq!(outcome.sent, 1);
    assert_eq!(
        store.get(&item.id).await.unwrap().unwrap().status,
        QueueStatus::Sent
    );
}

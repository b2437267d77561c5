//! Outbound email queue: persisted jobs with retry/backoff.
//!
//! A [`QueueItem`] is one row per outbound message. Rows are owned by the
//! store; every operation re-reads and re-writes persisted state, and all
//! mutation goes through field-scoped conditional updates gated on the
//! current status. Nothing in this module holds authoritative state in
//! memory.

mod model;
pub mod processor;
pub mod sender;
mod store;

pub use model::{Enqueue, QueueFilter, QueueItem, QueueStatus, QueueUpdate};
pub use processor::{BatchOutcome, QueueProcessor};
pub use sender::{QueueSender, RetryPolicy, SendOutcome};
pub use store::{MemoryQueueStore, QueueStore};

//! Campaign attachments: object storage and per-recipient watermarking.
//!
//! Both collaborators are black boxes behind traits. Production wires a
//! bucket client and a PDF service; tests use the in-memory store and a
//! stub watermarker.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::MailError;

/// Object storage addressed by opaque path strings.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>, MailError>;
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), MailError>;
}

/// Produces a watermarked copy of a document (diagonal plus footer text
/// overlay on every page).
#[async_trait]
pub trait Watermarker: Send + Sync {
    async fn watermark(
        &self,
        source: &[u8],
        diagonal_text: &str,
        footer_text: &str,
    ) -> Result<Vec<u8>, MailError>;
}

/// Thread-safe in-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().contains_key(path)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, MailError> {
        self.objects
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| MailError::ObjectStorage(format!("object not found: {path}")))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<(), MailError> {
        self.objects.write().insert(path.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryObjectStore::new();
        store.put("docs/teaser.pdf", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("docs/teaser.pdf").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_object_is_an_error() {
        let store = MemoryObjectStore::new();
        assert!(store.get("nope").await.is_err());
    }
}

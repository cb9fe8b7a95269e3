use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// Errors a [`CacheBackend`] implementation may raise. The bundled
/// [`InMemoryCacheBackend`] never fails, but a disk- or network-backed
/// manager would surface I/O errors through this type.
#[derive(thiserror::Error, Debug)]
pub enum CacheBackendError {
    /// A catch-all for backend-specific failures.
    #[error("cache backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// A keyed bytes store with per-entry TTL.
///
/// Implementors must be safe to share across concurrently-running
/// exchanges: the cache middleware holds one instance and calls into it
/// from every in-flight request.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Inserts `payload` under `key`, expiring after `ttl`. A second `add`
    /// for the same key always overwrites the first (last-writer-wins); no
    /// ordering guarantee is made between concurrent writers to the same
    /// key beyond that.
    async fn add(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CacheBackendError>;

    /// Looks up `key`. Returns `None` on a miss, including when the entry
    /// has expired — expiry is enforced lazily, at lookup time.
    async fn try_get(
        &self,
        key: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Bytes>, CacheBackendError>;

    /// Removes every entry from the store.
    async fn clear(&self, cancel: CancellationToken) -> Result<(), CacheBackendError>;
}

struct Entry {
    payload: Bytes,
    expires_at: Instant,
}

/// The in-memory reference [`CacheBackend`] implementation.
///
/// Modeled on the teacher's `MokaManager`/`CACacheManager`: a cheaply
/// `Clone`-able handle around an `Arc`-wrapped concurrent map. Unlike those,
/// this backend has no eviction policy beyond lazy TTL expiry, matching the
/// simpler store the spec describes (no LRU, no disk persistence).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheBackend {
    entries: Arc<DashMap<String, Entry>>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry").field("len", &self.payload.len()).finish_non_exhaustive()
    }
}

impl InMemoryCacheBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn add(
        &self,
        key: &str,
        payload: Bytes,
        ttl: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CacheBackendError> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.to_string(), Entry { payload, expires_at });
        Ok(())
    }

    async fn try_get(
        &self,
        key: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Bytes>, CacheBackendError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let now = Instant::now();
        let expired = matches!(self.entries.get(key), Some(entry) if entry.expires_at <= now);
        if expired {
            // Lazily evict; must not hold the shard guard across this call.
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|entry| entry.payload.clone()))
    }

    async fn clear(&self, _cancel: CancellationToken) -> Result<(), CacheBackendError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn fresh_entry_is_returned() {
        let backend = InMemoryCacheBackend::new();
        backend.add("k", Bytes::from_static(b"v"), Duration::from_secs(60), cancel()).await.unwrap();
        assert_eq!(backend.try_get("k", cancel()).await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_is_evicted() {
        let backend = InMemoryCacheBackend::new();
        backend.add("k", Bytes::from_static(b"v"), Duration::from_millis(1), cancel()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.try_get("k", cancel()).await.unwrap(), None);
        assert!(backend.entries.is_empty());
    }

    #[tokio::test]
    async fn second_add_overwrites_the_first() {
        let backend = InMemoryCacheBackend::new();
        backend.add("k", Bytes::from_static(b"old"), Duration::from_secs(60), cancel()).await.unwrap();
        backend.add("k", Bytes::from_static(b"new"), Duration::from_secs(60), cancel()).await.unwrap();
        assert_eq!(backend.try_get("k", cancel()).await.unwrap(), Some(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn clear_removes_every_entry() {
        let backend = InMemoryCacheBackend::new();
        backend.add("a", Bytes::from_static(b"1"), Duration::from_secs(60), cancel()).await.unwrap();
        backend.add("b", Bytes::from_static(b"2"), Duration::from_secs(60), cancel()).await.unwrap();
        backend.clear(cancel()).await.unwrap();
        assert_eq!(backend.try_get("a", cancel()).await.unwrap(), None);
        assert_eq!(backend.try_get("b", cancel()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_add_and_read() {
        let backend = InMemoryCacheBackend::new();
        let token = CancellationToken::new();
        token.cancel();
        backend.add("k", Bytes::from_static(b"v"), Duration::from_secs(60), token.clone()).await.unwrap();
        assert!(backend.entries.is_empty());
        assert_eq!(backend.try_get("k", token).await.unwrap(), None);
    }
}

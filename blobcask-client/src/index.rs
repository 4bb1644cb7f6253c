use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{trace, warn};

use blobcask_hash::{ContentHash, Fingerprint};

use crate::errors::IndexError;

/// Storage engine behind the fingerprint index.
///
/// Real engines sit on a per-host store shared across processes and
/// guard access with a cross-process mutex; a failed acquisition
/// surfaces as [`IndexError::LockTimeout`].
#[async_trait]
pub trait IndexBackend: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ContentHash>, IndexError>;
    async fn insert(&self, fingerprint: Fingerprint, hash: ContentHash) -> Result<(), IndexError>;
}

/// HashMap-based backend for tests and embedding.
#[derive(Default)]
pub struct MemoryIndex {
    entries: RwLock<HashMap<Fingerprint, ContentHash>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IndexBackend for MemoryIndex {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<ContentHash>, IndexError> {
        Ok(self.entries.read().await.get(fingerprint).cloned())
    }

    async fn insert(&self, fingerprint: Fingerprint, hash: ContentHash) -> Result<(), IndexError> {
        self.entries.write().await.insert(fingerprint, hash);
        Ok(())
    }
}

/// Adapter over the persistent fingerprint→hash index.
///
/// Every backend call is bounded by `lock_timeout`. Timeouts and
/// backend failures alike degrade to a soft miss: `get` reports
/// absent, `set` becomes a no-op. Callers fall back to the remote
/// channel instead of blocking or failing; entries, once written, are
/// treated as permanently valid.
pub struct FingerprintIndex {
    backend: Arc<dyn IndexBackend>,
    lock_timeout: Duration,
}

impl FingerprintIndex {
    pub fn new(backend: Arc<dyn IndexBackend>, lock_timeout: Duration) -> Self {
        Self {
            backend,
            lock_timeout,
        }
    }

    /// Look up the content hash recorded for a fingerprint. Any
    /// failure is reported as a miss.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<ContentHash> {
        match timeout(self.lock_timeout, self.backend.get(fingerprint)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(err)) => {
                warn!(%fingerprint, error = %err, "index lookup failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(%fingerprint, timeout = ?self.lock_timeout, "index lookup timed out, treating as miss");
                None
            }
        }
    }

    /// Record a fingerprint→hash association. Any failure degrades to
    /// a no-op.
    pub async fn set(&self, fingerprint: &Fingerprint, hash: &ContentHash) {
        let write = self
            .backend
            .insert(fingerprint.clone(), hash.clone());
        match timeout(self.lock_timeout, write).await {
            Ok(Ok(())) => {
                trace!(%fingerprint, %hash, "fingerprint persisted to index");
            }
            Ok(Err(err)) => {
                warn!(%fingerprint, error = %err, "index write failed, skipping");
            }
            Err(_) => {
                warn!(%fingerprint, timeout = ?self.lock_timeout, "index write timed out, skipping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobcask_hash::fingerprint;

    /// Backend that always reports a lock timeout.
    struct ContendedIndex;

    #[async_trait]
    impl IndexBackend for ContendedIndex {
        async fn get(&self, _: &Fingerprint) -> Result<Option<ContentHash>, IndexError> {
            Err(IndexError::LockTimeout)
        }

        async fn insert(&self, _: Fingerprint, _: ContentHash) -> Result<(), IndexError> {
            Err(IndexError::LockTimeout)
        }
    }

    /// Backend that never responds within any timeout.
    struct StalledIndex;

    #[async_trait]
    impl IndexBackend for StalledIndex {
        async fn get(&self, _: &Fingerprint) -> Result<Option<ContentHash>, IndexError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn insert(&self, _: Fingerprint, _: ContentHash) -> Result<(), IndexError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let index = FingerprintIndex::new(Arc::new(MemoryIndex::new()), Duration::from_secs(1));
        let fp = fingerprint(b"data");

        assert_eq!(index.get(&fp).await, None);
        index.set(&fp, &ContentHash::new("h1")).await;
        assert_eq!(index.get(&fp).await, Some(ContentHash::new("h1")));
    }

    #[tokio::test]
    async fn test_lock_timeout_is_soft_miss() {
        let index = FingerprintIndex::new(Arc::new(ContendedIndex), Duration::from_secs(1));
        let fp = fingerprint(b"data");

        assert_eq!(index.get(&fp).await, None);
        // Must not panic or error.
        index.set(&fp, &ContentHash::new("h1")).await;
    }

    #[tokio::test]
    async fn test_stalled_backend_is_soft_miss() {
        let index = FingerprintIndex::new(Arc::new(StalledIndex), Duration::from_millis(50));
        let fp = fingerprint(b"data");

        assert_eq!(index.get(&fp).await, None);
        index.set(&fp, &ContentHash::new("h1")).await;
    }
}

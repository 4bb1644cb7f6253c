//! Client facade orchestrating dedup, caching, and the remote channel.

use async_recursion::async_recursion;
use bytes::Bytes;
use futures::future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use blobcask_hash::{fingerprint, ContentHash, Fingerprint};

use crate::cache::{BlobCache, CacheStats};
use crate::config::ClientConfig;
use crate::errors::{ClientError, Result, StoreFault};
use crate::index::{FingerprintIndex, IndexBackend};
use crate::pending::{PendingStores, Registration};
use crate::transport::RemoteTransport;
use crate::tree::{is_normal_component, sanitize_name, DirTree};

/// Deduplicating client for a content-addressable blob store.
///
/// Owns the bounded blob cache, the pending-store registry, and the
/// fingerprint index adapter; all remote traffic goes through the
/// injected [`RemoteTransport`]. Construct one per process and share
/// it behind an `Arc`.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use blobcask_client::{BlobClient, ClientConfig, ChannelTransport, MemoryIndex};
/// use tokio::sync::mpsc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (req_tx, _req_rx) = mpsc::channel(64);
/// let (_resp_tx, resp_rx) = mpsc::channel(64);
///
/// let config = ClientConfig::new();
/// let transport = ChannelTransport::new(req_tx, resp_rx, config.request_timeout);
/// let client = BlobClient::new(config, transport, Arc::new(MemoryIndex::new()));
///
/// let hash = client.store(&b"hello"[..]).await?;
/// let bytes = client.fetch(&hash).await?;
/// assert_eq!(&bytes[..], b"hello");
/// # Ok(())
/// # }
/// ```
pub struct BlobClient {
    config: ClientConfig,
    transport: Arc<dyn RemoteTransport>,
    index: FingerprintIndex,
    cache: Mutex<BlobCache>,
    pending: PendingStores,
}

impl BlobClient {
    /// Create a client over a remote transport and an index backend.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn RemoteTransport>,
        index_backend: Arc<dyn IndexBackend>,
    ) -> Self {
        let index = FingerprintIndex::new(index_backend, config.lock_timeout);
        let cache = Mutex::new(BlobCache::new(config.cache_size_limit));
        Self {
            config,
            transport,
            index,
            cache,
            pending: PendingStores::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of blob-cache occupancy
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Store a payload, returning the content hash the remote store
    /// addresses it by.
    ///
    /// Identical payloads are deduplicated three ways before any bytes
    /// travel: through the persistent fingerprint index, by joining an
    /// in-flight store of the same fingerprint, and by asking the
    /// remote to resolve the fingerprint before uploading. A completed
    /// upload is only trusted after the remote's recomputed fingerprint
    /// matches the local one.
    pub async fn store(&self, payload: impl Into<Bytes>) -> Result<ContentHash> {
        let payload = payload.into();
        if payload.len() as u64 > self.config.file_size_limit {
            return Err(ClientError::PayloadTooLarge {
                size: payload.len() as u64,
                limit: self.config.file_size_limit,
            });
        }

        let fingerprint = fingerprint(&payload);

        if let Some(hash) = self.index.get(&fingerprint).await {
            trace!(%fingerprint, %hash, "fingerprint index hit");
            return Ok(hash);
        }

        match self.pending.register(fingerprint.clone()) {
            Registration::Follower(handle) => {
                debug!(%fingerprint, "joining in-flight store");
                Ok(handle.outcome().await?)
            }
            Registration::Leader(guard) => {
                let outcome = self.remote_exchange(&fingerprint, payload).await;
                if let Ok(hash) = &outcome {
                    self.index.set(&fingerprint, hash).await;
                }
                guard.complete(outcome.clone());
                Ok(outcome?)
            }
        }
    }

    /// Resolve-or-upload exchange with the round-trip integrity check.
    async fn remote_exchange(
        &self,
        fingerprint: &Fingerprint,
        payload: Bytes,
    ) -> std::result::Result<ContentHash, StoreFault> {
        if let Some(hash) = self.transport.resolve_fingerprint(fingerprint).await? {
            debug!(%fingerprint, %hash, "fingerprint already known remotely");
            return Ok(hash);
        }

        let reference = Uuid::new_v4().simple().to_string();
        debug!(%fingerprint, %reference, size = payload.len(), "uploading payload");
        let hash = self.transport.upload(&reference, payload).await?;

        let recomputed = self.transport.fingerprint_of(&hash).await?;
        if recomputed != *fingerprint {
            warn!(%fingerprint, %recomputed, %hash, "remote recomputed a different fingerprint");
            return Err(StoreFault::ChecksumMismatch {
                expected: fingerprint.clone(),
                actual: recomputed,
            });
        }

        Ok(hash)
    }

    /// Store a file's contents, rejecting oversized files before
    /// reading them.
    pub async fn store_file(&self, path: impl AsRef<Path>) -> Result<ContentHash> {
        let path = path.as_ref();
        let meta = fs::metadata(path).await?;
        if meta.len() > self.config.file_size_limit {
            return Err(ClientError::FileTooLarge {
                path: path.to_path_buf(),
                size: meta.len(),
                limit: self.config.file_size_limit,
            });
        }
        let contents = fs::read(path).await?;
        self.store(contents).await
    }

    /// Serialize a directory subtree into a content-addressed
    /// description, storing every regular file it contains.
    ///
    /// Every listed name produces an entry: non-regular entries store
    /// the "not a file" sentinel, and entries whose stat/read fails
    /// store the "internal error" sentinel instead of aborting the
    /// walk. Entries are processed concurrently.
    pub async fn store_dir(&self, path: impl AsRef<Path>) -> Result<DirTree> {
        self.walk_dir(path.as_ref()).await
    }

    #[async_recursion]
    async fn walk_dir(&self, path: &Path) -> Result<DirTree> {
        let mut listing = fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = listing.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push((name, entry.path()));
        }

        let stored = future::try_join_all(
            entries
                .into_iter()
                .map(|(name, path)| self.walk_entry(name, path)),
        )
        .await?;

        Ok(DirTree::Dir(stored.into_iter().collect()))
    }

    async fn walk_entry(&self, name: String, path: PathBuf) -> Result<(String, DirTree)> {
        let attempted: Result<DirTree> = async {
            let meta = fs::metadata(&path).await?;
            if meta.is_dir() {
                self.walk_dir(&path).await
            } else if meta.is_file() {
                Ok(DirTree::File(self.store_file(&path).await?))
            } else {
                let sentinel = self.config.not_a_file_sentinel.clone();
                Ok(DirTree::File(self.store(sentinel).await?))
            }
        }
        .await;

        match attempted {
            Ok(node) => Ok((name, node)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "directory entry failed, storing error sentinel");
                let sentinel = self.config.internal_error_sentinel.clone();
                let hash = self.store(sentinel).await?;
                Ok((name, DirTree::File(hash)))
            }
        }
    }

    /// Fetch blob bytes by content hash, consulting the bounded cache
    /// first. The returned `Bytes` are immutable, so cached entries
    /// cannot be mutated through them.
    pub async fn fetch(&self, hash: &ContentHash) -> Result<Bytes> {
        if let Some(blob) = self.cache.lock().await.get(hash) {
            trace!(%hash, "blob cache hit");
            return Ok(blob);
        }

        let blob = self.transport.fetch_blob(hash).await?;
        self.cache.lock().await.put(hash.clone(), blob.clone());
        Ok(blob)
    }

    /// Reconstruct a description onto the filesystem.
    ///
    /// Returns `false` if anything in the subtree fails, with no
    /// partial-write rollback: files and directories written before
    /// the failure remain.
    pub async fn store_to_path(&self, description: &DirTree, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.restore(description, path).await {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to materialize description");
                false
            }
        }
    }

    #[async_recursion]
    async fn restore(&self, description: &DirTree, path: &Path) -> Result<()> {
        match description {
            DirTree::File(hash) => {
                let blob = self.fetch(hash).await?;
                fs::write(path, &blob).await?;
                Ok(())
            }
            DirTree::Dir(entries) => {
                fs::create_dir_all(path).await?;
                future::try_join_all(entries.iter().map(|(name, child)| {
                    let child_path = self.resolve_child(path, name);
                    async move { self.restore(child, &child_path).await }
                }))
                .await?;
                Ok(())
            }
        }
    }

    /// Join an entry name onto its parent, sanitizing names that are
    /// not a single normal path segment so untrusted descriptions
    /// cannot escape the target directory.
    fn resolve_child(&self, parent: &Path, name: &str) -> PathBuf {
        if is_normal_component(name) {
            parent.join(name)
        } else {
            let safe = sanitize_name(name);
            warn!(name, %safe, "sanitized unsafe entry name");
            parent.join(safe)
        }
    }
}

//! Scripted remote and index backends for integration tests.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use blobcask::client::{IndexBackend, IndexError, RemoteTransport, TransportError};
use blobcask::hash::{fingerprint, ContentHash, Fingerprint};

/// In-memory remote blob server with operation counters.
///
/// Assigns content hashes in its own namespace (`cdn:` prefix) so
/// tests exercise the fingerprint/hash distinction. A corrupting
/// variant recomputes fingerprints wrongly to trigger the integrity
/// check.
#[derive(Default)]
pub struct MockRemote {
    blobs: Mutex<HashMap<ContentHash, Bytes>>,
    known: Mutex<HashMap<Fingerprint, ContentHash>>,
    pub resolves: AtomicUsize,
    pub uploads: AtomicUsize,
    pub fetches: AtomicUsize,
    corrupt: bool,
    delay: Option<Duration>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote whose recomputed fingerprints never match.
    pub fn corrupting() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    /// Delay every operation, leaving a window for concurrent callers
    /// to pile onto the same in-flight store.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Corrupting remote that also delays, for concurrent-failure tests.
    pub fn corrupting_with_delay(delay: Duration) -> Self {
        Self {
            corrupt: true,
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Pre-store content server-side, as if another client uploaded it.
    pub fn seed(&self, payload: &[u8]) -> ContentHash {
        let hash = remote_hash(payload);
        self.blobs
            .lock()
            .unwrap()
            .insert(hash.clone(), Bytes::copy_from_slice(payload));
        self.known
            .lock()
            .unwrap()
            .insert(fingerprint(payload), hash.clone());
        hash
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn remote_hash(payload: &[u8]) -> ContentHash {
    ContentHash::new(format!("cdn:{}", fingerprint(payload)))
}

#[async_trait]
impl RemoteTransport for MockRemote {
    async fn resolve_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<ContentHash>, TransportError> {
        self.pause().await;
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(self.known.lock().unwrap().get(fingerprint).cloned())
    }

    async fn upload(&self, _reference: &str, payload: Bytes) -> Result<ContentHash, TransportError> {
        self.pause().await;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let hash = remote_hash(&payload);
        if !self.corrupt {
            self.known
                .lock()
                .unwrap()
                .insert(fingerprint(&payload), hash.clone());
        }
        self.blobs.lock().unwrap().insert(hash.clone(), payload);
        Ok(hash)
    }

    async fn fingerprint_of(&self, hash: &ContentHash) -> Result<Fingerprint, TransportError> {
        self.pause().await;
        if self.corrupt {
            return Ok(fingerprint(b"bitrot"));
        }
        let blobs = self.blobs.lock().unwrap();
        let payload = blobs
            .get(hash)
            .ok_or_else(|| TransportError::Rejected(format!("no such blob: {hash}")))?;
        Ok(fingerprint(payload))
    }

    async fn fetch_blob(&self, hash: &ContentHash) -> Result<Bytes, TransportError> {
        self.pause().await;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| TransportError::Rejected(format!("no such blob: {hash}")))
    }
}

/// Index backend whose cross-process lock never comes through.
pub struct ContendedIndex;

#[async_trait]
impl IndexBackend for ContendedIndex {
    async fn get(&self, _: &Fingerprint) -> Result<Option<ContentHash>, IndexError> {
        Err(IndexError::LockTimeout)
    }

    async fn insert(&self, _: Fingerprint, _: ContentHash) -> Result<(), IndexError> {
        Err(IndexError::LockTimeout)
    }
}

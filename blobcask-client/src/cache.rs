use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

use blobcask_hash::ContentHash;

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub weight: u64,
    pub limit: u64,
    pub queue_len: usize,
}

/// In-memory cache of fetched blob bytes, bounded by total byte size.
///
/// Eviction is approximate LRU: every insert and every hit appends the
/// key to an access-order queue, and eviction pops from the front,
/// skipping entries that have a more recent occurrence further back.
/// This trades queue growth (proportional to access count between
/// evictions) for O(1) touches without a linked-list LRU structure.
#[derive(Debug)]
pub struct BlobCache {
    entries: HashMap<ContentHash, Bytes>,
    order: VecDeque<ContentHash>,
    weight: u64,
    limit: u64,
}

impl BlobCache {
    /// Create a cache with the given weight limit in bytes.
    pub fn new(limit: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            weight: 0,
            limit,
        }
    }

    /// Insert a blob, evicting older entries if the weight limit is
    /// exceeded. Overwriting a key replaces its weight rather than
    /// double-counting it.
    pub fn put(&mut self, hash: ContentHash, blob: Bytes) {
        self.insert(hash, blob, false);
    }

    /// Insert a blob at the front of the access-order queue, making it
    /// the first candidate for eviction.
    pub fn put_low_priority(&mut self, hash: ContentHash, blob: Bytes) {
        self.insert(hash, blob, true);
    }

    fn insert(&mut self, hash: ContentHash, blob: Bytes, low_priority: bool) {
        self.weight += blob.len() as u64;
        if let Some(replaced) = self.entries.insert(hash.clone(), blob) {
            self.weight -= replaced.len() as u64;
        }
        if low_priority {
            self.order.push_front(hash);
        } else {
            self.order.push_back(hash);
        }
        self.gc(self.limit);
    }

    /// Look up a blob, marking it as recently used on a hit.
    pub fn get(&mut self, hash: &ContentHash) -> Option<Bytes> {
        let blob = self.entries.get(hash)?.clone();
        // Touch: append another occurrence, leaving the old one in
        // place as a stale duplicate for gc to skip.
        self.order.push_back(hash.clone());
        Some(blob)
    }

    /// Evict oldest entries until total weight is at most `limit` or
    /// the access-order queue is exhausted. Returns the resulting
    /// weight; a single entry larger than the limit may leave it above.
    pub fn gc(&mut self, limit: u64) -> u64 {
        while self.weight > limit {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if self.order.contains(&key) {
                // A more recent touch exists; this pop was a stale
                // duplicate reference, not the last one.
                continue;
            }
            if let Some(blob) = self.entries.remove(&key) {
                self.weight -= blob.len() as u64;
                trace!(hash = %key, size = blob.len(), "evicted blob from cache");
            }
        }
        self.weight
    }

    /// Total bytes currently resident
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Configured weight ceiling
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            weight: self.weight,
            limit: self.limit,
            queue_len: self.order.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(len: usize) -> Bytes {
        Bytes::from(vec![0xabu8; len])
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = BlobCache::new(1024);
        cache.put("a".into(), Bytes::from_static(b"hello"));

        assert_eq!(cache.get(&"a".into()), Some(Bytes::from_static(b"hello")));
        assert_eq!(cache.get(&"missing".into()), None);
        assert_eq!(cache.weight(), 5);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_weight_bound_holds() {
        let mut cache = BlobCache::new(100);
        for i in 0..20 {
            cache.put(format!("h{i}").into(), blob(30));
            assert!(cache.weight() <= 100);
        }
    }

    #[test]
    fn test_eviction_recency() {
        let mut cache = BlobCache::new(100);
        cache.put("a".into(), blob(40));
        cache.put("b".into(), blob(40));

        // Touch A so it outranks B despite being older.
        assert!(cache.get(&"a".into()).is_some());

        // Forces exactly one eviction.
        cache.put("c".into(), blob(30));

        assert!(cache.contains(&"a".into()));
        assert!(!cache.contains(&"b".into()));
        assert!(cache.contains(&"c".into()));
        assert_eq!(cache.weight(), 70);
    }

    #[test]
    fn test_low_priority_evicted_first() {
        let mut cache = BlobCache::new(100);
        cache.put("normal".into(), blob(40));
        cache.put_low_priority("scratch".into(), blob(40));

        cache.put("more".into(), blob(40));

        assert!(cache.contains(&"normal".into()));
        assert!(!cache.contains(&"scratch".into()));
    }

    #[test]
    fn test_single_oversized_entry_retained() {
        let mut cache = BlobCache::new(10);
        cache.put("big".into(), blob(50));

        // Nothing else to evict; the entry stays above the limit.
        assert!(cache.contains(&"big".into()));
        assert_eq!(cache.weight(), 50);

        // Subsequent pressure evicts it.
        cache.put("small".into(), blob(5));
        assert!(!cache.contains(&"big".into()));
        assert_eq!(cache.weight(), 5);
    }

    #[test]
    fn test_overwrite_replaces_weight() {
        let mut cache = BlobCache::new(1024);
        cache.put("k".into(), blob(30));
        cache.put("k".into(), blob(10));

        assert_eq!(cache.weight(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_queue_entry_for_evicted_key() {
        let mut cache = BlobCache::new(100);
        cache.put("a".into(), blob(40));
        assert!(cache.get(&"a".into()).is_some()); // queue now holds a twice
        cache.put("b".into(), blob(40));
        cache.put("c".into(), blob(40)); // evicts a (both occurrences) then proceeds

        assert!(!cache.contains(&"a".into()));
        assert!(cache.weight() <= 100);
    }

    #[test]
    fn test_standalone_gc() {
        let mut cache = BlobCache::new(1000);
        cache.put("a".into(), blob(100));
        cache.put("b".into(), blob(100));

        let weight = cache.gc(150);
        assert_eq!(weight, 100);
        assert!(!cache.contains(&"a".into()));
        assert!(cache.contains(&"b".into()));
    }

    #[test]
    fn test_stats_snapshot() {
        let mut cache = BlobCache::new(256);
        cache.put("a".into(), blob(10));
        assert!(cache.get(&"a".into()).is_some());

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.weight, 10);
        assert_eq!(stats.limit, 256);
        assert_eq!(stats.queue_len, 2);
    }
}

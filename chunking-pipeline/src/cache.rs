use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::assembler::assemble_chunks;
use crate::config::{CacheTuning, ChunkingTuning};
use crate::types::Chunk;

struct CacheEntry {
    chunks: Vec<Chunk>,
    timestamp: DateTime<Utc>,
}

/// Content-addressed memoization of [`assemble_chunks`].
///
/// Keys are SHA-256 digests of the exact input text, so a hit is only ever
/// served for byte-identical input. Entries expire after a time-to-live
/// and the oldest are evicted past a size bound. Construct one at pipeline
/// startup and `clear()` it on explicit reset; there is no global instance.
///
/// Racing misses on the same key may compute twice; the last insert wins,
/// which is harmless because computation is deterministic.
pub struct ChunkCache {
    chunking: ChunkingTuning,
    tuning: CacheTuning,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ChunkCache {
    pub fn new(chunking: ChunkingTuning, tuning: CacheTuning) -> Self {
        Self {
            chunking,
            tuning,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkingTuning::default(), CacheTuning::default())
    }

    /// Returns the chunks for `text`, computing and caching them on a miss
    /// or an expired hit. Returned chunks are an owned deep copy; mutating
    /// them cannot corrupt the cache.
    pub async fn get_or_compute(&self, text: &str) -> Vec<Chunk> {
        let key = content_digest(text);

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if !self.is_expired(entry, Utc::now()) {
                    debug!(key = %key, "chunk cache hit");
                    return entry.chunks.clone();
                }
            }
        }

        // Computed outside the lock; a concurrent miss on the same key
        // recomputes redundantly rather than blocking.
        let chunks = assemble_chunks(text, &self.chunking);

        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            CacheEntry {
                chunks: chunks.clone(),
                timestamp: Utc::now(),
            },
        );
        self.cleanup(&mut entries);

        chunks
    }

    /// Empties the cache unconditionally.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.timestamp) >= Duration::seconds(self.tuning.ttl_secs)
    }

    /// Drops expired entries, then evicts oldest-first down to the size
    /// bound.
    fn cleanup(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Utc::now();
        entries.retain(|_, entry| !self.is_expired(entry, now));

        while entries.len() > self.tuning.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.timestamp)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_secs: i64, max_entries: usize) -> ChunkCache {
        ChunkCache::new(
            ChunkingTuning::default(),
            CacheTuning {
                ttl_secs,
                max_entries,
            },
        )
    }

    #[tokio::test]
    async fn second_call_is_value_equal() {
        let cache = cache(300, 16);
        let text = "Cached sentence one. Cached sentence two.";
        let first = cache.get_or_compute(text).await;
        let second = cache.get_or_compute(text).await;
        assert_eq!(first, second);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn cached_result_matches_direct_computation() {
        let cache = cache(300, 16);
        let text = "---\nid: 1\n---\nBody sentence. Another body sentence.";
        let cached = cache.get_or_compute(text).await;
        let direct = assemble_chunks(text, &ChunkingTuning::default());
        assert_eq!(cached, direct);
    }

    #[tokio::test]
    async fn returned_chunks_are_deep_copies() {
        let cache = cache(300, 16);
        let text = "Mutate me. Or try to.";
        let mut first = cache.get_or_compute(text).await;
        first[0].text.push_str(" CORRUPTED");
        first[0].segment_ids.push("bogus".into());

        let second = cache.get_or_compute(text).await;
        assert!(!second[0].text.contains("CORRUPTED"));
        assert!(!second[0].segment_ids.iter().any(|id| id == "bogus"));
    }

    #[tokio::test]
    async fn distinct_texts_get_distinct_entries() {
        let cache = cache(300, 16);
        cache.get_or_compute("First document.").await;
        cache.get_or_compute("Second document.").await;
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let cache = cache(0, 16);
        cache.get_or_compute("Ephemeral text.").await;
        // The insert's own cleanup already removed it.
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn size_bound_evicts_down_to_capacity() {
        let cache = cache(300, 2);
        cache.get_or_compute("Doc one.").await;
        cache.get_or_compute("Doc two.").await;
        cache.get_or_compute("Doc three.").await;
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let cache = cache(300, 16);
        cache.get_or_compute("Something here.").await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_computations_settle_consistently() {
        use std::sync::Arc;

        let cache = Arc::new(cache(300, 16));
        let text = "Raced sentence. Another raced sentence.";

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.get_or_compute(text).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.expect("task"));
        }
        for result in &results {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(cache.len().await, 1);
    }
}

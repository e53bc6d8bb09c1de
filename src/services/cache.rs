use crate::models::{canonical_pair, ScoredPair};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// In-memory cache of pair verdicts.
///
/// A pair scanned from both sides during one sweep hits the scoring backend
/// only once. Entries expire after the configured TTL so long-lived scorers
/// pick up profile edits.
#[derive(Clone)]
pub struct ScoreCache {
    entries: moka::future::Cache<String, ScoredPair>,
}

impl ScoreCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let entries = moka::future::CacheBuilder::new(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { entries }
    }

    pub async fn get(&self, user_a: &str, user_b: &str) -> Option<ScoredPair> {
        let key = CacheKey::pair(user_a, user_b);
        let hit = self.entries.get(&key).await;
        if hit.is_some() {
            tracing::trace!("Score cache hit: {}", key);
        }
        hit
    }

    pub async fn insert(&self, user_a: &str, user_b: &str, scored: ScoredPair) {
        self.entries.insert(CacheKey::pair(user_a, user_b), scored).await;
    }

    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Get cache statistics, after applying pending inserts and expirations
    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;
        CacheStats {
            entries: self.entries.entry_count(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Build an order-independent key for a pair verdict
    pub fn pair(user_a: &str, user_b: &str) -> String {
        let (first, second) = canonical_pair(user_a, user_b);
        format!("score:{}:{}", first, second)
    }
}

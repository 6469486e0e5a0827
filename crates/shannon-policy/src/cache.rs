//! Bounded, TTL'd evaluation cache keyed by a hash of the normalized input.
//!
//! Generalizes an LLM response cache (`ahash::AHashMap` keyed map,
//! `std::time::Instant`-based expiry, a `tokio::sync::RwLock` guarding the
//! map, separate hit/miss/eviction counters) from caching LLM responses to
//! caching policy decisions — same shape, different payload.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use ahash::{AHashMap, AHasher};
use tokio::sync::RwLock;

use crate::input::{Decision, PolicyInput};

struct Entry {
    decision: Decision,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheMetrics {
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct DecisionCache {
    entries: RwLock<AHashMap<u64, Entry>>,
    ttl: Duration,
    max_entries: usize,
    metrics: CacheMetrics,
}

impl DecisionCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            ttl,
            max_entries,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Hash the input so equal records (field-for-field) share a cache slot
    /// regardless of `HashMap` iteration order inside `context`, by hashing
    /// its canonical JSON form.
    pub fn key_for(input: &PolicyInput) -> u64 {
        let canonical = serde_json::to_vec(input).unwrap_or_default();
        let mut hasher = AHasher::default();
        canonical.hash(&mut hasher);
        hasher.finish()
    }

    pub async fn get(&self, key: u64) -> Option<Decision> {
        let entries = self.entries.read().await;
        match entries.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.decision.clone())
            }
            _ => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, key: u64, decision: Decision) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            self.evict_expired_or_oldest(&mut entries);
        }
        entries.insert(
            key,
            Entry {
                decision,
                inserted_at: Instant::now(),
            },
        );
    }

    fn evict_expired_or_oldest(&self, entries: &mut AHashMap<u64, Entry>) {
        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        let expired_removed = before - entries.len();
        if expired_removed > 0 {
            self.metrics
                .evictions
                .fetch_add(expired_removed as u64, Ordering::Relaxed);
            return;
        }
        if entries.len() >= self.max_entries {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| *k)
            {
                entries.remove(&oldest_key);
                self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_input(user: &str) -> PolicyInput {
        PolicyInput {
            user_id: user.to_string(),
            team: None,
            environment: "staging".to_string(),
            token_budget: 1000,
            complexity_score: 0.2,
            model: None,
            tool: None,
            ip_address: None,
            query: None,
            approved: false,
            recent_request_count: 0,
            similarity_to_prior_denied: None,
            similarity_to_prior_successful: None,
            context: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = DecisionCache::new(Duration::from_secs(60), 10);
        let key = DecisionCache::key_for(&sample_input("alice"));
        assert!(cache.get(key).await.is_none());
        cache
            .insert(key, Decision::allow("allowlisted_user", "ok"))
            .await;
        assert!(cache.get(key).await.is_some());
        assert_eq!(cache.metrics().hits, 1);
        assert_eq!(cache.metrics().misses, 1);
    }

    #[tokio::test]
    async fn expired_entry_counts_as_miss() {
        let cache = DecisionCache::new(Duration::from_millis(1), 10);
        let key = DecisionCache::key_for(&sample_input("bob"));
        cache
            .insert(key, Decision::allow("allowlisted_user", "ok"))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(key).await.is_none());
    }

    #[tokio::test]
    async fn bounded_entries_evicts() {
        let cache = DecisionCache::new(Duration::from_secs(60), 2);
        for i in 0..5 {
            let key = DecisionCache::key_for(&sample_input(&format!("user-{i}")));
            cache
                .insert(key, Decision::allow("allowlisted_user", "ok"))
                .await;
        }
        assert!(cache.metrics().evictions > 0);
    }
}

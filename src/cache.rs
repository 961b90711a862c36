//! Analysis result cache
//!
//! Repeated requests for the same wallet history skip feature extraction,
//! classification and the similarity search. Keys hash the address together
//! with the full transaction list, so a changed history is a cache miss.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::analyzer::ClassificationResult;
use crate::config::CacheConfig;
use crate::wallet::{normalize_address, WalletRequest};

/// Cached result with TTL
#[derive(Clone)]
struct CachedAnalysis {
    result: ClassificationResult,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedAnalysis {
    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// Hit/miss counters
#[derive(Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

pub struct AnalysisCache {
    entries: DashMap<String, CachedAnalysis>,
    ttl: Duration,
    max_entries: usize,
    stats: CacheStats,
}

impl AnalysisCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
            stats: CacheStats::default(),
        }
    }

    /// SHA-256 over the address and the serialized history
    pub fn key(request: &WalletRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_address(&request.address).as_bytes());
        hasher.update([0u8]);
        for tx in &request.transactions {
            hasher.update(tx.timestamp.to_le_bytes());
            hasher.update(tx.value.to_bits().to_le_bytes());
            hasher.update(tx.method.as_bytes());
            hasher.update([0u8]);
            if let Some(to) = &tx.to {
                hasher.update(to.as_bytes());
            }
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, request: &WalletRequest) -> Option<ClassificationResult> {
        let key = Self::key(request);
        if let Some(entry) = self.entries.get(&key) {
            if !entry.is_expired() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
            // Entry expired, remove it
            drop(entry);
            self.entries.remove(&key);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result; returns false when the cache is full
    pub fn insert(&self, request: &WalletRequest, result: ClassificationResult) -> bool {
        let key = Self::key(request);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let purged = self.purge_expired();
            if self.entries.len() >= self.max_entries {
                debug!(purged, entries = self.entries.len(), "Analysis cache full, not caching");
                return false;
            }
        }

        self.entries.insert(
            key,
            CachedAnalysis {
                result,
                cached_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        true
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::DecisionSource;
    use crate::wallet::{ActivityProfile, WalletTransaction};

    const ADDR: &str = "0x1111111111111111111111111111111111111111";

    fn request(values: &[f64]) -> WalletRequest {
        let txs = values
            .iter()
            .enumerate()
            .map(|(i, v)| WalletTransaction::new(i as i64 * 10, *v, "transfer"))
            .collect();
        WalletRequest::new(ADDR, txs)
    }

    fn result(label: &str) -> ClassificationResult {
        ClassificationResult {
            predicted_class: label.into(),
            confidence: 0.9,
            source: DecisionSource::Classifier,
            similar_wallets: None,
            activity: ActivityProfile::default(),
        }
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> AnalysisCache {
        AnalysisCache::new(&CacheConfig {
            enabled: true,
            ttl_secs,
            max_entries,
        })
    }

    #[test]
    fn test_key_depends_on_history() {
        let a = AnalysisCache::key(&request(&[1.0, 2.0]));
        assert_eq!(a, AnalysisCache::key(&request(&[1.0, 2.0])));
        assert_ne!(a, AnalysisCache::key(&request(&[1.0, 2.5])));
        assert_ne!(a, AnalysisCache::key(&request(&[1.0])));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_key_ignores_address_case() {
        let txs = vec![WalletTransaction::new(1, 0.5, "mint")];
        let lower = WalletRequest::new("0xaaaa000000000000000000000000000000000001", txs.clone());
        let upper = WalletRequest::new("0xAAAA000000000000000000000000000000000001", txs);
        assert_eq!(AnalysisCache::key(&lower), AnalysisCache::key(&upper));
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = cache(300, 10);
        assert!(cache.get(&request(&[1.0])).is_none());

        assert!(cache.insert(&request(&[1.0]), result("drop_hunter")));
        assert_eq!(cache.get(&request(&[1.0])).unwrap().predicted_class, "drop_hunter");
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
        assert!((cache.stats().hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = cache(0, 10);
        cache.insert(&request(&[1.0]), result("a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&request(&[1.0])).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_skips_insert() {
        let cache = cache(300, 2);
        assert!(cache.insert(&request(&[1.0]), result("a")));
        assert!(cache.insert(&request(&[2.0]), result("b")));
        assert!(!cache.insert(&request(&[3.0]), result("c")));
        assert_eq!(cache.len(), 2);

        // Replacing an existing key is allowed at capacity
        assert!(cache.insert(&request(&[1.0]), result("z")));
        assert_eq!(cache.get(&request(&[1.0])).unwrap().predicted_class, "z");
    }

    #[test]
    fn test_full_cache_purges_expired() {
        let cache = cache(0, 1);
        cache.insert(&request(&[1.0]), result("a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.insert(&request(&[2.0]), result("b")));
        assert_eq!(cache.len(), 1);
    }
}

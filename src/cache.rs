//! Route match caching
//!
//! Maps a normalized path to the index of the best-matching route and its
//! match result, with LRU eviction. The route table never changes after
//! construction, so a cached entry never goes stale. Misses are cached too.

use crate::matcher::MatchResult;
use crate::route::DEFAULT_CACHE_CAPACITY;
use crate::trace_log;
use lru::LruCache;
use std::num::NonZeroUsize;

/// Index of the winning route plus its match, or `None` for "no route".
pub(crate) type CachedMatch = Option<(usize, MatchResult)>;

/// Cache performance statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    pub fn lookups(&self) -> usize {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache of path lookups.
#[derive(Debug)]
pub struct MatchCache {
    entries: LruCache<String, CachedMatch>,
    stats: CacheStats,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(Self::cap(capacity)),
            stats: CacheStats::default(),
        }
    }

    fn cap(capacity: usize) -> NonZeroUsize {
        NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
    }

    pub(crate) fn get(&mut self, path: &str) -> Option<CachedMatch> {
        match self.entries.get(path) {
            Some(hit) => {
                self.stats.hits += 1;
                trace_log!("Match cache hit for '{}'", path);
                Some(hit.clone())
            }
            None => {
                self.stats.misses += 1;
                trace_log!("Match cache miss for '{}'", path);
                None
            }
        }
    }

    pub(crate) fn insert(&mut self, path: String, matched: CachedMatch) {
        self.entries.put(path, matched);
    }

    pub fn resize(&mut self, capacity: usize) {
        self.entries.resize(Self::cap(capacity));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: u32) -> CachedMatch {
        Some((
            0,
            MatchResult {
                is_match: true,
                score,
                ..MatchResult::default()
            },
        ))
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = MatchCache::new();
        assert!(cache.get("/a").is_none());

        cache.insert("/a".to_string(), hit(100));
        let cached = cache.get("/a").unwrap().unwrap();
        assert_eq!(cached.1.score, 100);

        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_negative_results_are_cached() {
        let mut cache = MatchCache::new();
        cache.insert("/nowhere".to_string(), None);
        assert_eq!(cache.get("/nowhere"), Some(None));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = MatchCache::with_capacity(2);
        cache.insert("/a".to_string(), hit(1));
        cache.insert("/b".to_string(), hit(2));
        cache.get("/a");
        cache.insert("/c".to_string(), hit(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("/b").is_none());
        assert!(cache.get("/a").is_some());
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut cache = MatchCache::with_capacity(0);
        assert_eq!(cache.capacity(), 1);
        cache.resize(8);
        assert_eq!(cache.capacity(), 8);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = MatchCache::new();
        cache.get("/a");
        cache.get("/b");
        cache.get("/c");
        cache.insert("/a".to_string(), hit(1));
        cache.insert("/b".to_string(), hit(1));
        cache.get("/a");
        cache.get("/b");

        assert_eq!(cache.stats().lookups(), 5);
        assert!((cache.stats().hit_rate() - 0.4).abs() < 0.001);

        cache.reset_stats();
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }
}

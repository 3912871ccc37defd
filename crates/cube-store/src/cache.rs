//! LRU cache of decoded band-lines for read-only cubes.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Cache key: (band, line), both 1-based.
pub type LineKey = (usize, usize);

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub memory_limit: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memory-bounded LRU of decoded lines.
pub struct LineCache {
    cache: LruCache<LineKey, Vec<f64>>,
    memory_limit: usize,
    current_memory: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl LineCache {
    /// Create a cache holding at most `memory_limit` bytes of lines of
    /// `samples` pixels each.
    pub fn new(memory_limit: usize, samples: usize) -> Self {
        let line_bytes = (samples * std::mem::size_of::<f64>()).max(1);
        let max_entries = (memory_limit / line_bytes).max(4);

        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            memory_limit,
            current_memory: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn get(&mut self, key: &LineKey) -> Option<&Vec<f64>> {
        if let Some(data) = self.cache.get(key) {
            self.hits += 1;
            Some(data)
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn contains(&self, key: &LineKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a line, evicting least recently used lines to stay within the
    /// memory limit.
    pub fn insert(&mut self, key: LineKey, data: Vec<f64>) {
        let data_size = data.len() * std::mem::size_of::<f64>();

        while self.current_memory + data_size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.current_memory = self
                    .current_memory
                    .saturating_sub(evicted.len() * std::mem::size_of::<f64>());
                self.evictions += 1;
            }
        }

        if data_size <= self.memory_limit {
            if let Some(old) = self.cache.put(key, data) {
                self.current_memory = self
                    .current_memory
                    .saturating_sub(old.len() * std::mem::size_of::<f64>());
            }
            self.current_memory += data_size;
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            memory_limit: self.memory_limit as u64,
            evictions: self.evictions,
        }
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = LineCache::new(1024, 8);
        assert!(cache.get(&(1, 1)).is_none());
        cache.insert((1, 1), vec![1.0; 8]);
        assert_eq!(cache.get(&(1, 1)).unwrap()[0], 1.0);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.memory_bytes, 64);
    }

    #[test]
    fn test_memory_bound_evicts_lru() {
        // Room for two 8-sample lines.
        let mut cache = LineCache::new(128, 8);
        cache.insert((1, 1), vec![0.0; 8]);
        cache.insert((1, 2), vec![0.0; 8]);
        cache.get(&(1, 1));
        cache.insert((1, 3), vec![0.0; 8]);

        assert!(cache.contains(&(1, 1)));
        assert!(!cache.contains(&(1, 2)));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);
    }
}

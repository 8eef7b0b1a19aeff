use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Counters exposed by a cache implementation for external monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// File-content cache capability consumed by the transclusion engine.
///
/// Implementations must never fail: a `get` miss (or any internal problem
/// surfacing as a miss) degrades to a direct file read. A cache shared across
/// concurrent calls is responsible for its own synchronization.
pub trait FileCache: Send + Sync + std::fmt::Debug {
    fn get(&self, path: &Path) -> Option<String>;
    fn set(&self, path: &Path, content: &str);
    fn clear(&self);
    fn stats(&self) -> CacheStats;
}

/// Cache that stores nothing; every lookup is a miss.
#[derive(Debug, Default)]
pub struct NoopCache;

impl FileCache for NoopCache {
    fn get(&self, _path: &Path) -> Option<String> {
        None
    }

    fn set(&self, _path: &Path, _content: &str) {}

    fn clear(&self) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: HashMap<PathBuf, String>,
    total_bytes: usize,
    hits: u64,
    misses: u64,
}

/// Bounded in-memory cache. Entries larger than the per-entry byte ceiling
/// are silently not cached; correctness is unaffected, only hit rate.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
    max_entry_bytes: usize,
}

impl MemoryCache {
    pub const DEFAULT_MAX_ENTRY_BYTES: usize = 1024 * 1024;

    pub fn new() -> Self {
        Self::with_max_entry_bytes(Self::DEFAULT_MAX_ENTRY_BYTES)
    }

    pub fn with_max_entry_bytes(max_entry_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryCacheInner::default()),
            max_entry_bytes,
        }
    }

    /// Total bytes of cached content, for external memory monitoring.
    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryCacheInner> {
        // a poisoned lock still holds consistent-enough state for a cache
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCache for MemoryCache {
    fn get(&self, path: &Path) -> Option<String> {
        let mut inner = self.lock();
        match inner.entries.get(path).cloned() {
            Some(content) => {
                inner.hits += 1;
                Some(content)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    fn set(&self, path: &Path, content: &str) {
        if content.len() > self.max_entry_bytes {
            return;
        }
        let mut inner = self.lock();
        if let Some(previous) = inner.entries.insert(path.to_path_buf(), content.to_string()) {
            inner.total_bytes -= previous.len();
        }
        inner.total_bytes += content.len();
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let path = Path::new("/docs/a.md");

        assert_eq!(cache.get(path), None);
        cache.set(path, "content");
        assert_eq!(cache.get(path).as_deref(), Some("content"));

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_memory_cache_entry_ceiling() {
        let cache = MemoryCache::with_max_entry_bytes(8);
        let path = Path::new("/docs/big.md");

        cache.set(path, "this is more than eight bytes");
        assert_eq!(cache.get(path), None);
        assert_eq!(cache.total_bytes(), 0);

        cache.set(path, "small");
        assert_eq!(cache.get(path).as_deref(), Some("small"));
        assert_eq!(cache.total_bytes(), 5);
    }

    #[test]
    fn test_memory_cache_replace_updates_total() {
        let cache = MemoryCache::new();
        let path = Path::new("/docs/a.md");

        cache.set(path, "12345678");
        cache.set(path, "123");
        assert_eq!(cache.total_bytes(), 3);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new();
        cache.set(Path::new("/a.md"), "a");
        cache.set(Path::new("/b.md"), "b");
        cache.clear();

        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(cache.get(Path::new("/a.md")), None);
    }

    #[test]
    fn test_noop_cache_never_stores() {
        let cache = NoopCache;
        cache.set(Path::new("/a.md"), "a");
        assert_eq!(cache.get(Path::new("/a.md")), None);
        assert_eq!(cache.stats(), CacheStats::default());
    }
}

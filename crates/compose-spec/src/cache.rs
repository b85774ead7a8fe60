//! Name-keyed document cache using moka
//!
//! Keys are the names documents were requested under, not their content, so
//! two names resolving to the same file are cached separately.

use crate::document::SpecDocument;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Loads answered from the cache
    pub hits: u64,
    /// Loads that had to resolve the document
    pub misses: u64,
}

/// Concurrent, bounded cache of resolved documents
#[derive(Debug, Clone)]
pub struct SpecCache {
    inner: Cache<String, Arc<SpecDocument>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl SpecCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            hits: Arc::default(),
            misses: Arc::default(),
        }
    }

    /// Insert document under `name`
    #[inline]
    pub fn insert(&self, name: impl Into<String>, document: Arc<SpecDocument>) {
        self.inner.insert(name.into(), document);
    }

    /// Get document cached under `name`
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<SpecDocument>> {
        self.inner.get(name)
    }

    /// Get cached document or compute, cache and return it
    ///
    /// Failures are not cached. Every call counts as a hit or a miss.
    pub fn try_get_or_insert_with<E, F>(&self, name: &str, f: F) -> Result<Arc<SpecDocument>, E>
    where
        F: FnOnce() -> Result<SpecDocument, E>,
    {
        if let Some(cached) = self.get(name) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let document = Arc::new(f()?);
        self.insert(name, Arc::clone(&document));
        Ok(document)
    }

    /// Invalidate a single entry
    #[inline]
    pub fn invalidate(&self, name: &str) {
        self.inner.invalidate(name);
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Check if cache holds `name`
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.run_pending_tasks();
        CacheStats {
            entry_count: self.inner.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for SpecCache {
    /// Create cache with default capacity (1,000 entries)
    fn default() -> Self {
        Self::new(1_000)
    }
}

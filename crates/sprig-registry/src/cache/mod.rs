//! Package document cache owned by an index source
//!
//! Entries never expire on their own. A run sees one consistent snapshot of
//! every document it touched; callers that keep a source across runs decide
//! when to [`MetadataCache::clear`] it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::api::IndexedPackage;

/// Cached lookup result. `package` is `None` when the index has no such package.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub package: Option<Arc<IndexedPackage>>,
}

/// In-memory document cache keyed by canonical package name
#[derive(Debug, Default)]
pub struct MetadataCache {
    cache: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    /// Create new metadata cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached lookup result
    pub fn get(&self, name: &str) -> Option<CacheEntry> {
        match self.cache.get(name) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Store a lookup result. When another thread stored one first, that
    /// entry wins and is returned, so every caller sees the same document.
    pub fn insert(&self, name: String, package: Option<Arc<IndexedPackage>>) -> Option<Arc<IndexedPackage>> {
        self.cache
            .entry(name)
            .or_insert_with(|| CacheEntry { package })
            .package
            .clone()
    }

    /// Cached result for `name`, loading it on a miss. Failed loads are not cached.
    pub fn get_or_load<E>(
        &self,
        name: &str,
        load: impl FnOnce() -> Result<Option<IndexedPackage>, E>,
    ) -> Result<Option<Arc<IndexedPackage>>, E> {
        if let Some(entry) = self.get(name) {
            return Ok(entry.package);
        }
        let loaded = load()?.map(Arc::new);
        Ok(self.insert(name.to_string(), loaded))
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let missing = self.cache.iter().filter(|e| e.package.is_none()).count();
        CacheStats {
            total_entries: self.cache.len(),
            missing_packages: missing,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Entries recording that the index has no such package
    pub missing_packages: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests;

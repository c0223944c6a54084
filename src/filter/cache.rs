use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::error::Result;
use crate::core::stats::FilterCacheStats;
use crate::filter::ast::Filter;
use crate::filter::parser;

/// Bounded cache of parsed filters keyed by the exact filter string
pub struct FilterCache {
    cache: Mutex<LruCache<String, Arc<Filter>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FilterCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        FilterCache {
            cache: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached AST for `input`, parsing and inserting on a miss.
    /// A hit promotes the entry to most-recently-used.
    pub fn get_or_parse(&self, input: &str) -> Result<Arc<Filter>> {
        if let Some(filter) = self.cache.lock().get(input) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(filter.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        // Parse outside the lock; a racing miss just parses twice
        let filter = Arc::new(parser::parse(input)?);
        self.cache.lock().put(input.to_string(), filter.clone());
        Ok(filter)
    }

    pub fn stats(&self) -> FilterCacheStats {
        FilterCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.cache.lock().len(),
            capacity: self.capacity,
        }
    }
}

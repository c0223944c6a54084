use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::stats::CoreStats;
use crate::core::types::{Entry, IndexedDoc, Requester};
use crate::filter::cache::FilterCache;
use crate::index::CatalogIndex;
use crate::search::cursor::Cursor;
use crate::search::planner::{self, SearchOptions, SearchPage};

/// Raw search inputs as they arrive from the request surface
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub filter: Option<String>,
    pub limit: usize,
    pub cursor: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchGet {
    pub items: Vec<Arc<IndexedDoc>>,
    pub omitted: usize,
}

/// The search core: one index snapshot behind a reader-writer lock, a
/// filter cache, and the tail position.
///
/// Many readers share the lock across a whole request; the single writer
/// (the change tailer) takes it per applied change and never holds it
/// across I/O.
pub struct Catalog {
    pub config: Config,
    index: RwLock<CatalogIndex>,
    filter_cache: FilterCache,
    last_seq: AtomicI64,
    build_ms: AtomicU64,
    started_at: Instant,
}

impl Catalog {
    pub fn new(config: Config) -> Self {
        let filter_cache = FilterCache::new(config.filter_cache_size);
        Catalog {
            config,
            index: RwLock::new(CatalogIndex::new()),
            filter_cache,
            last_seq: AtomicI64::new(0),
            build_ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn search(&self, params: &SearchParams, requester: &Requester) -> Result<SearchPage> {
        let filter = params
            .filter
            .as_deref()
            .map(|f| self.filter_cache.get_or_parse(f))
            .transpose()?;
        let cursor = params.cursor.as_deref().map(Cursor::decode).transpose()?;
        let opts = SearchOptions {
            limit: params.limit,
            cursor,
            q: params.q.clone(),
        };
        let index = self.index.read();
        planner::execute(&index, filter.as_deref(), &opts, requester)
    }

    /// Direct id lookup. Unknown and visibility-denied are both `None`, so
    /// callers cannot probe for existence.
    pub fn read(&self, id: &str, requester: &Requester) -> Option<Arc<IndexedDoc>> {
        let index = self.index.read();
        let doc = index.registry.get_by_entry_id(id)?;
        if requester.can_see(doc) {
            Some(doc.clone())
        } else {
            None
        }
    }

    /// Look up many ids, preserving input order for the docs found.
    /// Visibility-denied docs are counted, unknown ids are skipped.
    pub fn batch_get(&self, ids: &[String], requester: &Requester) -> BatchGet {
        let index = self.index.read();
        let mut items = Vec::new();
        let mut omitted = 0;
        for id in ids {
            match index.registry.get_by_entry_id(id) {
                Some(doc) if requester.can_see(doc) => items.push(doc.clone()),
                Some(_) => omitted += 1,
                None => {}
            }
        }
        BatchGet { items, omitted }
    }

    /// Install one tailed change, maintaining sort order. Stale revs are
    /// discarded, which also makes re-delivery idempotent.
    pub fn apply_change(&self, entry: Entry) -> bool {
        self.index.write().upsert(entry, true)
    }

    /// Bulk-install the latest view; ordering is deferred to one resort
    pub fn load_snapshot(&self, entries: Vec<Entry>) {
        let mut index = self.index.write();
        for entry in entries {
            index.upsert(entry, false);
        }
        index.resort();
    }

    pub fn stats(&self) -> CoreStats {
        let index = self.index.read();
        let docs = index.registry.len() as u64;
        // Postings dominate; the registry is approximated per doc
        let memory_approx = index.postings.memory_approx()
            + docs * std::mem::size_of::<IndexedDoc>() as u64;
        CoreStats {
            docs,
            eq_tokens: index.postings.eq.len(),
            presence_tokens: index.postings.presence.len(),
            postings_cardinality: index.postings.total_cardinality(),
            memory_approx,
            build_ms: self.build_ms.load(Ordering::Relaxed),
            last_seq: self.last_seq(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            filter_cache: self.filter_cache.stats(),
        }
    }

    pub fn doc_count(&self) -> u64 {
        self.index.read().registry.len() as u64
    }

    pub fn last_seq(&self) -> i64 {
        self.last_seq.load(Ordering::Acquire)
    }

    pub fn set_last_seq(&self, seq: i64) {
        self.last_seq.store(seq, Ordering::Release);
    }

    pub fn set_build_ms(&self, ms: u64) {
        self.build_ms.store(ms, Ordering::Relaxed);
    }
}

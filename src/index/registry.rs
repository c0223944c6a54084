use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::types::{DocId, Entry, IndexedDoc};

/// Descending `(updated_at, id)`: the most recently updated doc sorts first
pub fn sort_before(a: &Entry, b: &Entry) -> Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Doc-id allocation, per-doc records, and the precomputed sort order.
///
/// Doc ids start at 1 and are never reused within a process lifetime.
#[derive(Debug)]
pub struct DocRegistry {
    next_doc_id: u32,
    pub by_entry_id: HashMap<String, DocId>,
    pub docs: HashMap<DocId, Arc<IndexedDoc>>,
    pub sort_order: Vec<DocId>,
    pub rank: HashMap<DocId, u32>,
}

impl Default for DocRegistry {
    fn default() -> Self {
        DocRegistry::new()
    }
}

impl DocRegistry {
    pub fn new() -> Self {
        DocRegistry {
            next_doc_id: 1,
            by_entry_id: HashMap::new(),
            docs: HashMap::new(),
            sort_order: Vec::new(),
            rank: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Doc id for an entry id, allocating on first sight
    pub fn doc_id_for(&mut self, entry_id: &str) -> DocId {
        if let Some(&doc_id) = self.by_entry_id.get(entry_id) {
            return doc_id;
        }
        let doc_id = DocId(self.next_doc_id);
        self.next_doc_id += 1;
        self.by_entry_id.insert(entry_id.to_string(), doc_id);
        doc_id
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Arc<IndexedDoc>> {
        self.docs.get(&doc_id)
    }

    pub fn get_by_entry_id(&self, entry_id: &str) -> Option<&Arc<IndexedDoc>> {
        self.by_entry_id
            .get(entry_id)
            .and_then(|doc_id| self.docs.get(doc_id))
    }

    /// Install a doc record. With `maintain_order` the sort position is
    /// fixed up immediately; bulk loads pass false and call `resort` once.
    pub fn install(&mut self, doc: Arc<IndexedDoc>, maintain_order: bool) {
        let doc_id = doc.doc_id;
        let existed = self.docs.insert(doc_id, doc).is_some();

        if !maintain_order {
            if !existed {
                self.sort_order.push(doc_id);
            }
            return;
        }

        if existed {
            match self.rank.get(&doc_id) {
                Some(&pos) => {
                    self.sort_order.remove(pos as usize);
                }
                // Rank can be stale if the caller skipped resort after a
                // bulk load; fall back to a scan
                None => {
                    if let Some(pos) = self.sort_order.iter().position(|d| *d == doc_id) {
                        self.sort_order.remove(pos);
                    }
                }
            }
        }

        let docs = &self.docs;
        let entry = &docs[&doc_id].entry;
        let idx = self
            .sort_order
            .partition_point(|other| sort_before(&docs[other].entry, entry) == Ordering::Less);
        self.sort_order.insert(idx, doc_id);
        self.rebuild_rank();
    }

    /// Full resort, used once after a snapshot load
    pub fn resort(&mut self) {
        let docs = &self.docs;
        self.sort_order
            .sort_by(|a, b| sort_before(&docs[a].entry, &docs[b].entry));
        self.rebuild_rank();
    }

    fn rebuild_rank(&mut self) {
        self.rank.clear();
        for (i, doc_id) in self.sort_order.iter().enumerate() {
            self.rank.insert(*doc_id, i as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn entry(id: &str, updated_day: u32) -> Entry {
        Entry {
            id: id.to_string(),
            rev: 1,
            entry_type: "skill".to_string(),
            namespace: "ns".to_string(),
            name: id.to_string(),
            description: String::new(),
            version: None,
            attrs: BTreeMap::new(),
            manifest: serde_json::Value::Null,
            meta: serde_json::Value::Null,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, updated_day, 0, 0, 0).unwrap(),
        }
    }

    fn install(registry: &mut DocRegistry, id: &str, updated_day: u32, ordered: bool) -> DocId {
        let doc_id = registry.doc_id_for(id);
        let doc = Arc::new(IndexedDoc::build(doc_id, entry(id, updated_day)));
        registry.install(doc, ordered);
        doc_id
    }

    #[test]
    fn doc_ids_start_at_one_and_are_stable() {
        let mut registry = DocRegistry::new();
        let a = registry.doc_id_for("a");
        let b = registry.doc_id_for("b");
        assert_eq!(a, DocId(1));
        assert_eq!(b, DocId(2));
        assert_eq!(registry.doc_id_for("a"), DocId(1));
    }

    #[test]
    fn bulk_load_defers_ordering_to_resort() {
        let mut registry = DocRegistry::new();
        install(&mut registry, "a", 1, false);
        install(&mut registry, "b", 3, false);
        install(&mut registry, "c", 2, false);
        registry.resort();

        let order: Vec<&str> = registry
            .sort_order
            .iter()
            .map(|d| registry.docs[d].entry.id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(registry.rank[&registry.by_entry_id["b"]], 0);
    }

    #[test]
    fn ordered_install_keeps_rank_current() {
        let mut registry = DocRegistry::new();
        install(&mut registry, "a", 1, true);
        install(&mut registry, "b", 3, true);
        // Same timestamp as b: id breaks the tie, descending
        install(&mut registry, "c", 3, true);

        let order: Vec<&str> = registry
            .sort_order
            .iter()
            .map(|d| registry.docs[d].entry.id.as_str())
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);

        // Re-install "a" with a newer timestamp; it moves to the front
        install(&mut registry, "a", 9, true);
        let order: Vec<&str> = registry
            .sort_order
            .iter()
            .map(|d| registry.docs[d].entry.id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert_eq!(registry.sort_order.len(), 3);
        assert_eq!(registry.rank.len(), 3);
    }
}

pub mod evaluator;
pub mod posting;
pub mod registry;
pub mod token;
pub mod visibility;

use roaring::RoaringBitmap;
use std::sync::Arc;

use crate::core::types::{Entry, IndexedDoc};
use crate::index::posting::PostingStore;
use crate::index::registry::DocRegistry;
use crate::index::token::Scope;
use crate::index::visibility::VisibilityIndex;

/// One consistent snapshot: registry, postings, visibility classes, and the
/// universe of live doc ids. All mutation goes through `upsert` so the
/// invariants hold at every quiescent point.
pub struct CatalogIndex {
    pub registry: DocRegistry,
    pub postings: PostingStore,
    pub visibility: VisibilityIndex,
    pub universe: RoaringBitmap,
}

impl Default for CatalogIndex {
    fn default() -> Self {
        CatalogIndex::new()
    }
}

impl CatalogIndex {
    pub fn new() -> Self {
        CatalogIndex {
            registry: DocRegistry::new(),
            postings: PostingStore::new(),
            visibility: VisibilityIndex::new(),
            universe: RoaringBitmap::new(),
        }
    }

    /// Install or replace an entry.
    ///
    /// Returns false (and changes nothing) unless the incoming rev is
    /// strictly greater than the stored one. Bulk loads pass
    /// `maintain_order = false` and call `resort` once at the end.
    pub fn upsert(&mut self, entry: Entry, maintain_order: bool) -> bool {
        if let Some(existing) = self.registry.get_by_entry_id(&entry.id) {
            if entry.rev <= existing.entry.rev {
                return false;
            }
        }

        let doc_id = self.registry.doc_id_for(&entry.id);
        if let Some(old) = self.registry.get(doc_id).cloned() {
            self.unindex_doc(&old);
        }

        let doc = Arc::new(IndexedDoc::build(doc_id, entry));
        self.index_doc(&doc);
        self.universe.insert(doc_id.0);
        self.registry.install(doc, maintain_order);
        true
    }

    pub fn resort(&mut self) {
        self.registry.resort();
    }

    fn index_doc(&mut self, doc: &IndexedDoc) {
        let doc_id = doc.doc_id;
        let postings = &mut self.postings;
        for_each_token(&doc.entry, |kind, token| match kind {
            TokenKind::Eq => postings.add_eq(token, doc_id),
            TokenKind::Presence => postings.add_presence(token, doc_id),
        });
        self.visibility.add(doc_id, doc.visibility, &doc.allowed_groups);
    }

    fn unindex_doc(&mut self, doc: &IndexedDoc) {
        let doc_id = doc.doc_id;
        let postings = &mut self.postings;
        for_each_token(&doc.entry, |kind, token| match kind {
            TokenKind::Eq => postings.remove_eq(&token, doc_id),
            TokenKind::Presence => postings.remove_presence(&token, doc_id),
        });
        self.visibility
            .remove(doc_id, doc.visibility, &doc.allowed_groups);
    }
}

#[derive(Clone, Copy)]
enum TokenKind {
    Eq,
    Presence,
}

/// Enumerate every posting token an entry contributes.
///
/// Top-level tokens cover the six first-class fields (`version` only when
/// set); attribute tokens cover each non-empty key, with duplicate values
/// collapsed. The same enumeration drives indexing and removal, which is
/// what keeps invariant bookkeeping symmetric.
fn for_each_token(entry: &Entry, mut emit: impl FnMut(TokenKind, String)) {
    let top_fields = [
        ("id", entry.id.as_str()),
        ("type", entry.entry_type.as_str()),
        ("name", entry.name.as_str()),
        ("namespace", entry.namespace.as_str()),
    ];
    for (field, value) in top_fields {
        emit(TokenKind::Eq, token::eq_token(Scope::Top, field, value));
        emit(TokenKind::Presence, token::presence_token(Scope::Top, field));
    }
    if let Some(version) = &entry.version {
        emit(TokenKind::Eq, token::eq_token(Scope::Top, "version", version));
        emit(TokenKind::Presence, token::presence_token(Scope::Top, "version"));
    }
    emit(
        TokenKind::Eq,
        token::eq_token(Scope::Top, "rev", &entry.rev.to_string()),
    );
    emit(TokenKind::Presence, token::presence_token(Scope::Top, "rev"));

    for (key, values) in &entry.attrs {
        if values.is_empty() {
            continue;
        }
        emit(TokenKind::Presence, token::presence_token(Scope::Attr, key));
        let mut seen: Vec<&String> = Vec::with_capacity(values.len());
        for value in values {
            if seen.contains(&value) {
                continue;
            }
            seen.push(value);
            emit(TokenKind::Eq, token::eq_token(Scope::Attr, key, value));
        }
    }
}

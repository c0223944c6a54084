use roaring::RoaringBitmap;
use std::collections::HashMap;

use crate::core::types::DocId;

/// Token → compressed doc-id set, split into equality and presence maps so
/// lookups dispatch without inspecting token shape.
#[derive(Debug, Default)]
pub struct PostingStore {
    pub eq: HashMap<String, RoaringBitmap>,
    pub presence: HashMap<String, RoaringBitmap>,
}

impl PostingStore {
    pub fn new() -> Self {
        PostingStore::default()
    }

    pub fn add_eq(&mut self, token: String, doc: DocId) {
        self.eq.entry(token).or_default().insert(doc.0);
    }

    pub fn add_presence(&mut self, token: String, doc: DocId) {
        self.presence.entry(token).or_default().insert(doc.0);
    }

    /// Remove a membership, dropping the bitmap once it empties
    pub fn remove_eq(&mut self, token: &str, doc: DocId) {
        if let Some(bitmap) = self.eq.get_mut(token) {
            bitmap.remove(doc.0);
            if bitmap.is_empty() {
                self.eq.remove(token);
            }
        }
    }

    pub fn remove_presence(&mut self, token: &str, doc: DocId) {
        if let Some(bitmap) = self.presence.get_mut(token) {
            bitmap.remove(doc.0);
            if bitmap.is_empty() {
                self.presence.remove(token);
            }
        }
    }

    pub fn get_eq(&self, token: &str) -> Option<&RoaringBitmap> {
        self.eq.get(token)
    }

    pub fn get_presence(&self, token: &str) -> Option<&RoaringBitmap> {
        self.presence.get(token)
    }

    /// Sum of bitmap cardinalities across both maps
    pub fn total_cardinality(&self) -> u64 {
        self.eq.values().map(|b| b.len()).sum::<u64>()
            + self.presence.values().map(|b| b.len()).sum::<u64>()
    }

    /// Rough resident bytes: serialized bitmap sizes plus token text
    pub fn memory_approx(&self) -> u64 {
        let bitmaps: usize = self
            .eq
            .iter()
            .chain(self.presence.iter())
            .map(|(token, bitmap)| token.len() + bitmap.serialized_size())
            .sum();
        bitmaps as u64
    }
}

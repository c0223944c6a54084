use roaring::RoaringBitmap;
use std::collections::HashMap;

use crate::core::types::{DocId, Requester, Visibility};

/// Precomputed visibility classes plus per-group grants for restricted docs.
///
/// Every live doc sits in exactly one of the three class bitmaps; a doc
/// appears under a group iff it is restricted and that group grants access.
#[derive(Debug, Default)]
pub struct VisibilityIndex {
    pub public: RoaringBitmap,
    pub internal: RoaringBitmap,
    pub restricted: RoaringBitmap,
    pub groups: HashMap<String, RoaringBitmap>,
}

impl VisibilityIndex {
    pub fn new() -> Self {
        VisibilityIndex::default()
    }

    pub fn add(&mut self, doc: DocId, visibility: Visibility, allowed_groups: &[String]) {
        match visibility {
            Visibility::Public => {
                self.public.insert(doc.0);
            }
            Visibility::Internal => {
                self.internal.insert(doc.0);
            }
            Visibility::Restricted => {
                self.restricted.insert(doc.0);
                for group in allowed_groups {
                    self.groups.entry(group.clone()).or_default().insert(doc.0);
                }
            }
        }
    }

    pub fn remove(&mut self, doc: DocId, visibility: Visibility, allowed_groups: &[String]) {
        match visibility {
            Visibility::Public => {
                self.public.remove(doc.0);
            }
            Visibility::Internal => {
                self.internal.remove(doc.0);
            }
            Visibility::Restricted => {
                self.restricted.remove(doc.0);
                for group in allowed_groups {
                    if let Some(bitmap) = self.groups.get_mut(group) {
                        bitmap.remove(doc.0);
                        if bitmap.is_empty() {
                            self.groups.remove(group);
                        }
                    }
                }
            }
        }
    }

    /// Union of everything the requester may observe
    pub fn allowed_for(&self, requester: &Requester) -> RoaringBitmap {
        let mut allowed = self.public.clone();
        if requester.is_authenticated {
            allowed |= &self.internal;
        }
        for group in &requester.groups {
            if let Some(bitmap) = self.groups.get(group) {
                allowed |= bitmap;
            }
        }
        allowed
    }
}

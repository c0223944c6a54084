use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Process-local document number used in posting bitmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(id: u32) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for DocId {
    fn from(id: u32) -> Self {
        DocId(id)
    }
}

/// A revisioned catalog entry as stored upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub rev: i64,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub namespace: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub manifest: serde_json::Value,
    #[serde(default)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const VISIBILITY_ATTR: &str = "visibility";
pub const ALLOWED_GROUP_ATTR: &str = "allowed_group";

/// Visibility class derived from `attrs.visibility[0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
    Restricted,
}

impl Visibility {
    /// First `visibility` value wins; anything unrecognized is public
    pub fn from_attrs(attrs: &BTreeMap<String, Vec<String>>) -> Self {
        match attrs.get(VISIBILITY_ATTR).and_then(|v| v.first()) {
            Some(v) if v == "internal" => Visibility::Internal,
            Some(v) if v == "restricted" => Visibility::Restricted,
            _ => Visibility::Public,
        }
    }
}

/// Attribute keys surfaced in the card projection
pub const CARD_ATTR_KEYS: [&str; 8] = [
    "tag",
    "capability",
    "env",
    "status",
    "visibility",
    "endpoint",
    "auth",
    "owner",
];

/// Restricted projection of an entry for list views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryCard {
    pub id: String,
    pub rev: i64,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub description: String,
    pub attrs: BTreeMap<String, Vec<String>>,
}

impl EntryCard {
    pub fn project(entry: &Entry) -> Self {
        let mut attrs = BTreeMap::new();
        for key in CARD_ATTR_KEYS {
            if let Some(values) = entry.attrs.get(key) {
                if !values.is_empty() {
                    attrs.insert(key.to_string(), values.clone());
                }
            }
        }
        EntryCard {
            id: entry.id.clone(),
            rev: entry.rev,
            entry_type: entry.entry_type.clone(),
            name: entry.name.clone(),
            namespace: entry.namespace.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
            attrs,
        }
    }
}

/// An entry as held by the index
#[derive(Debug, Clone)]
pub struct IndexedDoc {
    pub doc_id: DocId,
    pub entry: Entry,
    pub name_folded: String,
    pub description_folded: String,
    pub visibility: Visibility,
    pub allowed_groups: Vec<String>,
    pub card: EntryCard,
}

impl IndexedDoc {
    pub fn build(doc_id: DocId, entry: Entry) -> Self {
        let visibility = Visibility::from_attrs(&entry.attrs);
        let allowed_groups = if visibility == Visibility::Restricted {
            entry
                .attrs
                .get(ALLOWED_GROUP_ATTR)
                .map(|groups| {
                    let mut seen = Vec::new();
                    for g in groups {
                        if !seen.contains(g) {
                            seen.push(g.clone());
                        }
                    }
                    seen
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        IndexedDoc {
            name_folded: entry.name.to_ascii_lowercase(),
            description_folded: entry.description.to_ascii_lowercase(),
            visibility,
            allowed_groups,
            card: EntryCard::project(&entry),
            doc_id,
            entry,
        }
    }

    /// Case-folded substring match over name and description
    pub fn matches_text(&self, folded_query: &str) -> bool {
        self.name_folded.contains(folded_query) || self.description_folded.contains(folded_query)
    }
}

/// Authentication context attached to every read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requester {
    pub is_authenticated: bool,
    pub subject: Option<String>,
    pub groups: Vec<String>,
}

impl Requester {
    pub fn anonymous() -> Self {
        Requester::default()
    }

    pub fn authenticated(subject: Option<String>, groups: Vec<String>) -> Self {
        Requester {
            is_authenticated: true,
            subject,
            groups,
        }
    }

    /// Whether this requester may observe the given doc
    pub fn can_see(&self, doc: &IndexedDoc) -> bool {
        match doc.visibility {
            Visibility::Public => true,
            Visibility::Internal => self.is_authenticated,
            Visibility::Restricted => self
                .groups
                .iter()
                .any(|g| doc.allowed_groups.iter().any(|a| a == g)),
        }
    }
}

use crate::core::error::{Error, Result};

/// First-class entry fields addressable without the `attrs.` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopField {
    Id,
    Type,
    Name,
    Namespace,
    Version,
    Rev,
}

impl TopField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopField::Id => "id",
            TopField::Type => "type",
            TopField::Name => "name",
            TopField::Namespace => "namespace",
            TopField::Version => "version",
            TopField::Rev => "rev",
        }
    }

    fn lookup(key: &str) -> Option<TopField> {
        match key {
            "id" => Some(TopField::Id),
            "type" => Some(TopField::Type),
            "name" => Some(TopField::Name),
            "namespace" => Some(TopField::Namespace),
            "version" => Some(TopField::Version),
            "rev" => Some(TopField::Rev),
            _ => None,
        }
    }
}

/// A filter key classified as a top-level field or an attribute key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedKey {
    Top(TopField),
    Attr(String),
}

/// Classify a raw filter key.
///
/// `attrs.`-prefixed keys always address the attribute map; the six field
/// names address the entry itself; anything else is attribute shorthand
/// (`tag` means `attrs.tag`).
pub fn resolve(key: &str, key_pos: usize) -> Result<ResolvedKey> {
    if let Some(rest) = key.strip_prefix("attrs.") {
        if rest.is_empty() {
            return Err(Error::invalid_filter(key_pos, "empty attribute key"));
        }
        return Ok(ResolvedKey::Attr(rest.to_string()));
    }
    if let Some(field) = TopField::lookup(key) {
        return Ok(ResolvedKey::Top(field));
    }
    Ok(ResolvedKey::Attr(key.to_string()))
}

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::types::Entry;

/// Opaque pagination position in the descending `(updated_at, id)` order.
///
/// On the wire this is URL-safe unpadded Base64 over a small JSON object;
/// both fields must be strings and `updated_at` must be RFC 3339.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub updated_at: DateTime<Utc>,
    pub id: String,
}

#[derive(Serialize, Deserialize)]
struct WireCursor {
    updated_at: String,
    id: String,
}

impl Cursor {
    pub fn after(entry: &Entry) -> Self {
        Cursor {
            updated_at: entry.updated_at,
            id: entry.id.clone(),
        }
    }

    /// Whether `entry` sorts strictly after this cursor position
    pub fn admits(&self, entry: &Entry) -> bool {
        entry.updated_at < self.updated_at
            || (entry.updated_at == self.updated_at && entry.id < self.id)
    }

    pub fn encode(&self) -> Result<String> {
        let wire = WireCursor {
            updated_at: self.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            id: self.id.clone(),
        };
        let json = serde_json::to_vec(&wire)
            .map_err(|e| Error::internal(format!("cursor encode: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| Error::invalid_request("cursor is not valid base64url"))?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|_| Error::invalid_request("cursor is not valid JSON"))?;
        let updated_at = value
            .get("updated_at")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::invalid_request("cursor updated_at must be a string"))?;
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::invalid_request("cursor id must be a string"))?;
        let updated_at = DateTime::parse_from_rfc3339(updated_at)
            .map_err(|_| Error::invalid_request("cursor updated_at is not a timestamp"))?
            .with_timezone(&Utc);
        Ok(Cursor {
            updated_at,
            id: id.to_string(),
        })
    }
}

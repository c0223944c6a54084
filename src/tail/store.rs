use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::BTreeMap;

use crate::core::error::Result;
use crate::core::types::Entry;

/// One row of the append-only change log, joined to the entry it names.
/// The join is null when the revision has been pruned upstream.
#[derive(Debug, Clone)]
pub struct ChangeRow {
    pub seq: i64,
    pub id: String,
    pub rev: i64,
    pub change_type: String,
    pub entry: Option<Entry>,
}

/// The three read-only queries the tailer needs from the durable store
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every row of the latest view
    async fn list_latest(&self) -> Result<Vec<Entry>>;

    /// Highest change sequence, 0 when the log is empty
    async fn max_seq(&self) -> Result<i64>;

    /// Change rows with `seq > after_seq`, ascending, at most `batch_size`
    async fn next_changes(&self, after_seq: i64, batch_size: i64) -> Result<Vec<ChangeRow>>;
}

const LIST_LATEST: &str = "\
SELECT id, rev, type, namespace, name, description, version, \
       attrs, manifest, meta, created_at, updated_at \
FROM entries_latest";

const MAX_SEQ: &str = "SELECT COALESCE(MAX(seq), 0) AS seq FROM entry_changes";

const NEXT_CHANGES: &str = "\
SELECT c.seq, c.id, c.rev, c.change_type, \
       e.id AS e_id, e.rev AS e_rev, e.type AS e_type, \
       e.namespace AS e_namespace, e.name AS e_name, \
       e.description AS e_description, e.version AS e_version, \
       e.attrs AS e_attrs, e.manifest AS e_manifest, e.meta AS e_meta, \
       e.created_at AS e_created_at, e.updated_at AS e_updated_at \
FROM entry_changes c \
LEFT JOIN entries e ON e.id = c.id AND e.rev = c.rev \
WHERE c.seq > $1 \
ORDER BY c.seq ASC \
LIMIT $2";

/// Postgres-backed store
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        PgCatalogStore { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(4).connect(url).await?;
        Ok(PgCatalogStore { pool })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_latest(&self) -> Result<Vec<Entry>> {
        let rows = sqlx::query(LIST_LATEST).fetch_all(&self.pool).await?;
        rows.iter().map(entry_from_latest_row).collect()
    }

    async fn max_seq(&self) -> Result<i64> {
        let row = sqlx::query(MAX_SEQ).fetch_one(&self.pool).await?;
        Ok(row.try_get("seq")?)
    }

    async fn next_changes(&self, after_seq: i64, batch_size: i64) -> Result<Vec<ChangeRow>> {
        let rows = sqlx::query(NEXT_CHANGES)
            .bind(after_seq)
            .bind(batch_size)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(change_from_row).collect()
    }
}

fn entry_from_latest_row(row: &PgRow) -> Result<Entry> {
    let attrs: Option<serde_json::Value> = row.try_get("attrs")?;
    Ok(Entry {
        id: row.try_get("id")?,
        rev: row.try_get("rev")?,
        entry_type: row.try_get("type")?,
        namespace: row.try_get("namespace")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
        attrs: parse_attrs(attrs.as_ref()),
        manifest: row
            .try_get::<Option<serde_json::Value>, _>("manifest")?
            .unwrap_or(serde_json::Value::Null),
        meta: row
            .try_get::<Option<serde_json::Value>, _>("meta")?
            .unwrap_or(serde_json::Value::Null),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn change_from_row(row: &PgRow) -> Result<ChangeRow> {
    // A null join key means the revision is gone; the change still counts
    // for sequence advancement
    let entry_id: Option<String> = row.try_get("e_id")?;
    let entry = match entry_id {
        None => None,
        Some(id) => {
            let attrs: Option<serde_json::Value> = row.try_get("e_attrs")?;
            Some(Entry {
                id,
                rev: row.try_get("e_rev")?,
                entry_type: row.try_get("e_type")?,
                namespace: row.try_get("e_namespace")?,
                name: row.try_get("e_name")?,
                description: row.try_get("e_description")?,
                version: row.try_get("e_version")?,
                attrs: parse_attrs(attrs.as_ref()),
                manifest: row
                    .try_get::<Option<serde_json::Value>, _>("e_manifest")?
                    .unwrap_or(serde_json::Value::Null),
                meta: row
                    .try_get::<Option<serde_json::Value>, _>("e_meta")?
                    .unwrap_or(serde_json::Value::Null),
                created_at: row.try_get("e_created_at")?,
                updated_at: row.try_get("e_updated_at")?,
            })
        }
    };
    Ok(ChangeRow {
        seq: row.try_get("seq")?,
        id: row.try_get("id")?,
        rev: row.try_get("rev")?,
        change_type: row.try_get("change_type")?,
        entry,
    })
}

/// Attribute blobs are tolerant JSON: an object whose values are strings
/// or arrays of strings; anything else is dropped.
fn parse_attrs(value: Option<&serde_json::Value>) -> BTreeMap<String, Vec<String>> {
    let mut attrs = BTreeMap::new();
    let Some(object) = value.and_then(|v| v.as_object()) else {
        return attrs;
    };
    for (key, raw) in object {
        let values = match raw {
            serde_json::Value::String(s) => vec![s.clone()],
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
            _ => continue,
        };
        attrs.insert(key.clone(), values);
    }
    attrs
}

//! The backing document store the gateway talks to.
//!
//! Any store that can insert, list (optionally ordered), merge-update and
//! delete JSON documents by collection and id satisfies [`DocumentBackend`].
//! Two implementations ship with the crate: [`MemoryBackend`] for tests and
//! throwaway catalogs, and [`SqliteBackend`] which keeps every collection in a
//! single table with a JSON column.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::config::BackendConfig;
use crate::document::RawDocument;
use crate::error::{FolioError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for Direction {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(FolioError::Other(format!(
                "Unknown sort direction '{other}' (expected asc or desc)"
            ))),
        }
    }
}

/// Server-side ordering for `get_all`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        OrderBy {
            field: field.into(),
            direction,
        }
    }
}

pub trait DocumentBackend: Send {
    /// Store a new document. Fails if the id is already taken.
    fn insert(&self, collection: &str, doc: &RawDocument) -> Result<()>;

    fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>>;

    /// All documents of a collection, in natural (insertion) order unless
    /// `order` is given. Ties keep natural order.
    fn get_all(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<RawDocument>>;

    /// Shallow-merge `patch` into the document's data and stamp `updated_at`.
    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Names of collections holding at least one document
    fn collections(&self) -> Result<Vec<String>>;

    fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id)?.is_some())
    }

    /// Append an entry to the migration log.
    fn record_migration(&self, description: &str) -> Result<()>;

    fn migration_history(&self) -> Result<Vec<MigrationRecord>>;
}

/// One entry of the migration log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub description: String,
    pub applied_at: DateTime<Utc>,
}

/// Open the backend described by the config.
pub fn open_backend(config: &BackendConfig) -> Result<Box<dyn DocumentBackend>> {
    match config {
        BackendConfig::Memory => Ok(Box::new(MemoryBackend::new())),
        BackendConfig::Sqlite { path } => Ok(Box::new(SqliteBackend::open(path)?)),
    }
}

/// Order fields must be plain identifiers; they end up in a JSON path.
pub(crate) fn validate_order_field(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(FolioError::Other(format!("Invalid order field '{field}'")))
    }
}

pub(crate) fn merge_patch(
    data: &mut serde_json::Value,
    patch: &serde_json::Map<String, serde_json::Value>,
) {
    if !data.is_object() {
        *data = serde_json::Value::Object(serde_json::Map::new());
    }
    if let Some(map) = data.as_object_mut() {
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
    }
}

/// Compare two documents on an order field. `createdAt` and `updatedAt`
/// address the envelope timestamps; anything else is a data field.
pub(crate) fn compare_on_field(a: &RawDocument, b: &RawDocument, field: &str) -> Ordering {
    match field {
        "createdAt" => a.created_at.cmp(&b.created_at),
        "updatedAt" => a.updated_at.cmp(&b.updated_at),
        _ => compare_json(a.data.get(field), b.data.get(field)),
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string,
/// other kinds compare equal.
pub(crate) fn compare_json(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    use serde_json::Value;

    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

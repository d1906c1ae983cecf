use super::{
    compare_on_field, merge_patch, validate_order_field, Direction, DocumentBackend,
    MigrationRecord, OrderBy,
};
use crate::document::RawDocument;
use crate::error::{FolioError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory backend. Each collection is a Vec kept in insertion order.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, Vec<RawDocument>>>,
    migrations: RwLock<Vec<MigrationRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn insert(&self, collection: &str, doc: &RawDocument) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == doc.id) {
            return Err(FolioError::Backend(format!(
                "Document {collection}/{} already exists",
                doc.id
            )));
        }
        docs.push(doc.clone());
        Ok(())
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    fn get_all(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<RawDocument>> {
        let mut docs = self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();

        if let Some(order) = order {
            validate_order_field(&order.field)?;
            // sort_by is stable, so ties keep insertion order in both directions
            docs.sort_by(|a, b| {
                let ord = compare_on_field(a, b, &order.field);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        Ok(docs)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        patch: &serde_json::Map<String, serde_json::Value>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut collections = self.collections.write();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| FolioError::not_found(collection, id))?;
        merge_patch(&mut doc.data, patch);
        doc.updated_at = updated_at;
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write();
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| FolioError::not_found(collection, id))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(FolioError::not_found(collection, id));
        }
        Ok(())
    }

    fn collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn record_migration(&self, description: &str) -> Result<()> {
        self.migrations.write().push(MigrationRecord {
            description: description.to_string(),
            applied_at: Utc::now(),
        });
        Ok(())
    }

    fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
        Ok(self.migrations.read().clone())
    }
}

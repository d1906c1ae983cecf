use crate::backend::{open_backend, Direction, DocumentBackend, MemoryBackend, MigrationRecord, OrderBy};
use crate::config::{CatalogConfig, IdStrategy};
use crate::document::{Document, RawDocument, ENVELOPE_FIELDS};
use crate::error::{FolioError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// The main entry point for the catalog data layer.
/// Owns the backing document store and hands out collection handles
/// for CRUD operations.
pub struct Store {
    backend: Box<dyn DocumentBackend>,
    id_strategy: IdStrategy,
}

impl Store {
    /// Open the store described by the config.
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let backend = open_backend(&config.backend)?;
        Ok(Store::with_backend(backend, config.id_strategy))
    }

    /// A store over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Store::with_backend(Box::new(MemoryBackend::new()), IdStrategy::default())
    }

    pub fn with_backend(backend: Box<dyn DocumentBackend>, id_strategy: IdStrategy) -> Self {
        Store {
            backend,
            id_strategy,
        }
    }

    /// Get a handle for one collection. The handle starts unloaded;
    /// call [`Collection::refresh`] to populate its cache.
    pub fn collection(&self, name: &str) -> Collection<'_> {
        Collection {
            store: self,
            name: name.to_string(),
            order: None,
            data: Vec::new(),
            state: CollectionState::Unloaded,
            last_error: None,
        }
    }

    pub fn backend(&self) -> &dyn DocumentBackend {
        self.backend.as_ref()
    }

    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    pub fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
        self.backend.migration_history()
    }

    /// Document counts per collection.
    pub fn status(&self) -> Result<serde_json::Value> {
        let mut collections = serde_json::Map::new();
        for name in self.backend.collections()? {
            let count = self.backend.get_all(&name, None)?.len();
            collections.insert(name, serde_json::json!({ "count": count }));
        }

        Ok(serde_json::json!({
            "id_strategy": self.id_strategy,
            "collections": collections,
            "migrations": self.backend.migration_history()?.len(),
        }))
    }

    /// Determine the id for a new document in `collection`.
    fn generate_id(&self, collection: &str, data: &serde_json::Value) -> Result<String> {
        let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("");
        Ok(match self.id_strategy {
            IdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Nanoid => nanoid::nanoid!(),
            IdStrategy::Slug if slug::slugify(name).is_empty() => nanoid::nanoid!(),
            IdStrategy::Slug => self.resolve_slug_conflict(collection, &slug::slugify(name))?,
        })
    }

    /// First of `base`, `base-2`, `base-3`, ... not taken in the collection
    fn resolve_slug_conflict(&self, collection: &str, base: &str) -> Result<String> {
        if !self.backend.contains(collection, base)? {
            return Ok(base.to_string());
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.backend.contains(collection, &candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

/// Load state of a collection handle's cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionState {
    /// Initial fetch has not completed yet
    Unloaded,
    Ready,
    /// The initial fetch failed; stays until a refresh succeeds
    Failed(String),
}

/// A handle to one collection with a cached, fully materialized snapshot.
///
/// Every successful mutation is followed by a full re-fetch of the collection;
/// the cache is never patched incrementally.
pub struct Collection<'a> {
    store: &'a Store,
    name: String,
    order: Option<OrderBy>,
    data: Vec<RawDocument>,
    state: CollectionState,
    last_error: Option<String>,
}

impl<'a> Collection<'a> {
    /// Order every fetch by `field`.
    pub fn ordered_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some(OrderBy::new(field, direction));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached documents from the last successful fetch
    pub fn data(&self) -> &[RawDocument] {
        &self.data
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == CollectionState::Unloaded
    }

    /// The persistent load failure, or else the last failed mutation.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            CollectionState::Failed(msg) => Some(msg),
            _ => self.last_error.as_deref(),
        }
    }

    /// Clear a transient mutation error. A failed initial load is not cleared.
    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Cached document by id
    pub fn find(&self, id: &str) -> Option<&RawDocument> {
        self.data.iter().find(|d| d.id == id)
    }

    /// Re-fetch the whole collection into the cache.
    pub fn refresh(&mut self) -> Result<&[RawDocument]> {
        match self.store.backend.get_all(&self.name, self.order.as_ref()) {
            Ok(docs) => {
                self.data = docs;
                self.state = CollectionState::Ready;
                Ok(&self.data)
            }
            Err(e) => {
                log::error!("Error fetching {}: {}", self.name, e);
                if self.state == CollectionState::Ready {
                    self.last_error = Some(e.to_string());
                } else {
                    self.state = CollectionState::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Fetch a single document straight from the backend.
    pub fn get(&self, id: &str) -> Result<RawDocument> {
        self.store
            .backend
            .get(&self.name, id)?
            .ok_or_else(|| FolioError::not_found(&self.name, id))
    }

    /// Insert a new document, stamping both timestamps. Returns the new id.
    pub fn create(&mut self, data: serde_json::Value) -> Result<String> {
        let result = self.try_create(data);
        self.after_mutation(result)
    }

    pub fn create_typed<T: Serialize>(&mut self, data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        self.create(value)
    }

    /// Merge `patch` into an existing document and stamp its update time.
    pub fn update(&mut self, id: &str, patch: serde_json::Value) -> Result<()> {
        let result = self.try_update(id, patch);
        self.after_mutation(result)
    }

    pub fn remove(&mut self, id: &str) -> Result<()> {
        let result = self.store.backend.delete(&self.name, id);
        self.after_mutation(result)
    }

    /// Decode the cache into typed documents, skipping rows that do not fit `T`.
    pub fn documents<T: DeserializeOwned>(&self) -> Vec<Document<T>> {
        self.data
            .iter()
            .filter_map(|doc| match doc.decode() {
                Ok(typed) => Some(typed),
                Err(e) => {
                    log::warn!("Skipping undecodable document {}/{}: {}", self.name, doc.id, e);
                    None
                }
            })
            .collect()
    }

    fn try_create(&self, data: serde_json::Value) -> Result<String> {
        let data = strip_envelope(self.require_object(data, "<new>")?);
        let id = self.store.generate_id(&self.name, &data)?;
        let now = Utc::now();
        let doc = RawDocument {
            id: id.clone(),
            created_at: now,
            updated_at: now,
            data,
        };
        self.store.backend.insert(&self.name, &doc)?;
        Ok(id)
    }

    fn try_update(&self, id: &str, patch: serde_json::Value) -> Result<()> {
        let patch = strip_envelope(self.require_object(patch, id)?);
        let map = patch.as_object().cloned().unwrap_or_default();
        self.store.backend.update(&self.name, id, &map, Utc::now())
    }

    fn require_object(&self, data: serde_json::Value, id: &str) -> Result<serde_json::Value> {
        if data.is_object() {
            Ok(data)
        } else {
            Err(FolioError::InvalidField {
                collection: self.name.clone(),
                id: id.to_string(),
                field: "<root>".into(),
                reason: "document data must be a JSON object".into(),
            })
        }
    }

    /// Record a failed mutation, or reload the cache after a successful one.
    /// A write that landed is reported as done even if the reload fails.
    fn after_mutation<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                if let Err(e) = self.refresh() {
                    log::warn!("{} was written but could not be re-fetched: {}", self.name, e);
                    self.last_error = Some(e.to_string());
                }
                Ok(value)
            }
            Err(e) => {
                log::error!("Error writing to {}: {}", self.name, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

fn strip_envelope(mut data: serde_json::Value) -> serde_json::Value {
    if let Some(map) = data.as_object_mut() {
        for key in ENVELOPE_FIELDS {
            map.remove(key);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteBackend;
    use crate::model::Skill;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
    use std::sync::Arc;

    /// Backend whose every call fails, for error-path tests
    struct BrokenBackend;

    impl DocumentBackend for BrokenBackend {
        fn insert(&self, _: &str, _: &RawDocument) -> Result<()> {
            Err(FolioError::Backend("permission denied".into()))
        }
        fn get(&self, _: &str, _: &str) -> Result<Option<RawDocument>> {
            Err(FolioError::Backend("permission denied".into()))
        }
        fn get_all(&self, _: &str, _: Option<&OrderBy>) -> Result<Vec<RawDocument>> {
            Err(FolioError::Backend("network unreachable".into()))
        }
        fn update(
            &self,
            _: &str,
            _: &str,
            _: &serde_json::Map<String, serde_json::Value>,
            _: chrono::DateTime<Utc>,
        ) -> Result<()> {
            Err(FolioError::Backend("permission denied".into()))
        }
        fn delete(&self, _: &str, _: &str) -> Result<()> {
            Err(FolioError::Backend("permission denied".into()))
        }
        fn collections(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn record_migration(&self, _: &str) -> Result<()> {
            Ok(())
        }
        fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_create_refreshes_cache() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        assert!(skills.is_loading());

        let id = skills
            .create(json!({ "name": "React", "category": "frontend", "proficiency": 90 }))
            .unwrap();

        assert!(!skills.is_loading());
        assert_eq!(skills.data().len(), 1);
        let doc = skills.find(&id).unwrap();
        assert_eq!(doc.data["name"], "React");
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[test]
    fn test_create_strips_envelope_fields() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        let id = skills
            .create(json!({ "id": "forced", "createdAt": "yesterday", "name": "Git" }))
            .unwrap();
        assert_ne!(id, "forced");
        let doc = skills.get(&id).unwrap();
        assert!(doc.data.get("id").is_none());
        assert!(doc.data.get("createdAt").is_none());
    }

    #[test]
    fn test_update_merges_and_stamps() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        let id = skills
            .create(json!({ "name": "React", "proficiency": 90 }))
            .unwrap();
        let created = skills.get(&id).unwrap();

        skills.update(&id, json!({ "proficiency": 95 })).unwrap();

        let doc = skills.find(&id).unwrap();
        assert_eq!(doc.data["name"], "React");
        assert_eq!(doc.data["proficiency"], 95);
        assert!(doc.updated_at >= created.updated_at);
        assert_eq!(doc.created_at, created.created_at);
    }

    #[test]
    fn test_remove_and_not_found() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        let id = skills.create(json!({ "name": "React" })).unwrap();

        skills.remove(&id).unwrap();
        assert!(skills.data().is_empty());

        let err = skills.get(&id).unwrap_err();
        assert!(matches!(err, FolioError::NotFound { .. }));

        let err = skills.remove(&id).unwrap_err();
        assert!(matches!(err, FolioError::NotFound { .. }));
        assert!(skills.error().is_some());
        skills.dismiss_error();
        assert!(skills.error().is_none());
    }

    #[test]
    fn test_non_object_data_rejected() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        let err = skills.create(json!(["React"])).unwrap_err();
        assert!(matches!(err, FolioError::InvalidField { .. }));
    }

    #[test]
    fn test_ordered_handle() {
        let store = Store::in_memory();
        let mut writer = store.collection("skills");
        writer.create(json!({ "name": "React", "proficiency": 90 })).unwrap();
        writer.create(json!({ "name": "Git", "proficiency": 95 })).unwrap();

        let mut by_prof = store
            .collection("skills")
            .ordered_by("proficiency", Direction::Desc);
        let names: Vec<_> = by_prof
            .refresh()
            .unwrap()
            .iter()
            .map(|d| d.data["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Git", "React"]);
    }

    #[test]
    fn test_typed_documents_skip_bad_rows() {
        let store = Store::in_memory();
        let mut skills = store.collection("skills");
        skills
            .create_typed(&Skill {
                name: "React".into(),
                category: "frontend".into(),
                proficiency: 90,
            })
            .unwrap();
        skills.create(json!({ "proficiency": "high" })).unwrap();

        let typed = skills.documents::<Skill>();
        assert_eq!(typed.len(), 1);
        assert_eq!(typed[0].data.name, "React");
    }

    #[test]
    fn test_failed_initial_fetch_is_persistent() {
        let store = Store::with_backend(Box::new(BrokenBackend), IdStrategy::Nanoid);
        let mut projects = store.collection("projects");
        assert!(projects.refresh().is_err());
        assert!(matches!(projects.state(), CollectionState::Failed(_)));

        projects.dismiss_error();
        assert_eq!(projects.error(), Some("Backend error: network unreachable"));
    }

    #[test]
    fn test_failed_mutation_surfaces_unmodified() {
        let store = Store::with_backend(Box::new(BrokenBackend), IdStrategy::Nanoid);
        let mut projects = store.collection("projects");
        let err = projects.create(json!({ "name": "Shop" })).unwrap_err();
        assert_eq!(err.to_string(), "Backend error: permission denied");
    }

    /// Memory backend whose listing can be switched off
    struct FlakyList {
        inner: MemoryBackend,
        listing_down: Arc<AtomicBool>,
    }

    impl DocumentBackend for FlakyList {
        fn insert(&self, collection: &str, doc: &RawDocument) -> Result<()> {
            self.inner.insert(collection, doc)
        }
        fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>> {
            self.inner.get(collection, id)
        }
        fn get_all(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<RawDocument>> {
            if self.listing_down.load(AtomicOrdering::SeqCst) {
                return Err(FolioError::Backend("network".into()));
            }
            self.inner.get_all(collection, order)
        }
        fn update(
            &self,
            collection: &str,
            id: &str,
            patch: &serde_json::Map<String, serde_json::Value>,
            updated_at: chrono::DateTime<Utc>,
        ) -> Result<()> {
            self.inner.update(collection, id, patch, updated_at)
        }
        fn delete(&self, collection: &str, id: &str) -> Result<()> {
            self.inner.delete(collection, id)
        }
        fn collections(&self) -> Result<Vec<String>> {
            self.inner.collections()
        }
        fn record_migration(&self, description: &str) -> Result<()> {
            self.inner.record_migration(description)
        }
        fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
            self.inner.migration_history()
        }
    }

    #[test]
    fn test_write_succeeds_when_refetch_fails() {
        let listing_down = Arc::new(AtomicBool::new(false));
        let backend = FlakyList {
            inner: MemoryBackend::new(),
            listing_down: listing_down.clone(),
        };
        let store = Store::with_backend(Box::new(backend), IdStrategy::Nanoid);
        let mut projects = store.collection("projects");
        projects.create(json!({ "name": "Shop" })).unwrap();
        assert_eq!(projects.state(), &CollectionState::Ready);

        listing_down.store(true, AtomicOrdering::SeqCst);
        let id = projects.create(json!({ "name": "App" })).unwrap();
        assert_eq!(projects.get(&id).unwrap().data["name"], "App");
        assert_eq!(projects.error(), Some("Backend error: network"));
        // the cache keeps the last good snapshot
        assert_eq!(projects.data().len(), 1);

        projects.update(&id, json!({ "featured": true })).unwrap();
        projects.remove(&id).unwrap();
        assert!(projects.get(&id).is_err());

        listing_down.store(false, AtomicOrdering::SeqCst);
        projects.dismiss_error();
        assert_eq!(projects.refresh().unwrap().len(), 1);
        assert!(projects.error().is_none());
    }

    #[test]
    fn test_slug_ids_with_suffix() {
        let store = Store::with_backend(Box::new(MemoryBackend::new()), IdStrategy::Slug);
        let mut skills = store.collection("skills");
        assert_eq!(skills.create(json!({ "name": "Node.js" })).unwrap(), "node-js");
        assert_eq!(skills.create(json!({ "name": "Node JS" })).unwrap(), "node-js-2");
        assert_eq!(skills.create(json!({ "name": "node.js" })).unwrap(), "node-js-3");
        // no usable name falls back to a random id
        let id = skills.create(json!({ "proficiency": 1 })).unwrap();
        assert!(!id.is_empty());
    }

    #[test]
    fn test_other_id_strategies() {
        for strategy in [IdStrategy::Ulid, IdStrategy::Uuid, IdStrategy::Nanoid] {
            let store = Store::with_backend(Box::new(MemoryBackend::new()), strategy);
            let mut skills = store.collection("skills");
            let a = skills.create(json!({ "name": "React" })).unwrap();
            let b = skills.create(json!({ "name": "React" })).unwrap();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_status_over_sqlite() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let store = Store::with_backend(Box::new(backend), IdStrategy::Ulid);
        let mut projects = store.collection("projects");
        projects.create(json!({ "name": "Shop" })).unwrap();
        projects.create(json!({ "name": "App" })).unwrap();

        let status = store.status().unwrap();
        assert_eq!(status["collections"]["projects"]["count"], 2);
        assert_eq!(status["id_strategy"], "ulid");
    }
}

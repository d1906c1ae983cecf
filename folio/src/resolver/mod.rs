//! Identifier/name lookup over one snapshot of a target collection.
//!
//! A resolver is built from the documents it answers for and should not
//! outlive that snapshot. Nothing is shared or cached between resolvers.

use crate::document::Document;
use crate::model::{name_key, Named, Reference};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    /// id -> display name
    by_id: HashMap<String, String>,
    /// lowercase name -> (id, display name)
    by_name: HashMap<String, (String, String)>,
}

impl ReferenceResolver {
    pub fn from_documents<T: Named>(docs: &[Document<T>]) -> Self {
        let mut resolver = ReferenceResolver::default();
        for doc in docs {
            let name = doc.data.name();
            resolver.by_id.insert(doc.id.clone(), name.to_string());
            if name.is_empty() {
                continue;
            }
            // Names are unique by invariant; if not, the first record wins
            resolver
                .by_name
                .entry(name_key(name))
                .or_insert_with(|| (doc.id.clone(), name.to_string()));
        }
        resolver
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn is_known_id(&self, token: &str) -> bool {
        self.by_id.contains_key(token)
    }

    /// Tag a stored token as an id of this snapshot or a literal name.
    pub fn classify(&self, token: &str) -> Reference {
        if self.is_known_id(token) {
            Reference::Resolved(token.to_string())
        } else {
            Reference::Legacy(token.to_string())
        }
    }

    /// Id of the record whose name matches case-insensitively
    pub fn id_for_name(&self, name: &str) -> Option<&str> {
        self.by_name.get(&name_key(name)).map(|(id, _)| id.as_str())
    }

    pub fn name_for_id(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Display name for a token: id lookup first, then name lookup, else the
    /// token itself. Dangling references come back unchanged.
    pub fn resolve<'s>(&'s self, token: &'s str) -> &'s str {
        if let Some(name) = self.by_id.get(token) {
            return name;
        }
        if let Some((_, name)) = self.by_name.get(&name_key(token)) {
            return name;
        }
        token
    }

    pub fn resolve_all(&self, tokens: &[String]) -> Vec<String> {
        tokens.iter().map(|t| self.resolve(t).to_string()).collect()
    }
}

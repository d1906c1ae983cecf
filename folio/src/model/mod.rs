//! Catalog entities as they are stored in their collections.
//!
//! Field names follow the stored camelCase keys. Reference fields
//! (`Project::technologies`, `Skill::category`) stay plain strings on disk so
//! that legacy documents written before migration remain readable; use
//! [`Reference`] to work with them once a target snapshot is at hand.

use serde::{Deserialize, Deserializer, Serialize};

/// Legacy documents carry explicit nulls where a field was never filled in.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A record that can be looked up by display name
pub trait Named {
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    /// Legacy category name, or a Category id once migrated
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub proficiency: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Skill ids, or literal skill names before migration
    #[serde(default, deserialize_with = "null_as_default")]
    pub technologies: Vec<String>,
    /// Free-form label, independent of the Category entity
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default, alias = "githubUrl", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured: bool,
}

impl Project {
    pub fn has_live_url(&self) -> bool {
        has_text(self.live_url.as_deref())
    }

    pub fn has_source_url(&self) -> bool {
        has_text(self.source_url.as_deref())
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.map(|s| !s.trim().is_empty()).unwrap_or(false)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issuer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub credential_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

impl Named for Skill {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Category {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Certification {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Raw document data: the `name` field, or "" when absent.
impl Named for serde_json::Value {
    fn name(&self) -> &str {
        self.get("name").and_then(|v| v.as_str()).unwrap_or("")
    }
}

/// A stored pointer to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Reference {
    /// Token is the id of an existing target record
    Resolved(String),
    /// Token is a literal display name (pre-migration, or dangling)
    Legacy(String),
}

impl Reference {
    pub fn token(&self) -> &str {
        match self {
            Reference::Resolved(t) | Reference::Legacy(t) => t,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    pub fn into_token(self) -> String {
        match self {
            Reference::Resolved(t) | Reference::Legacy(t) => t,
        }
    }
}

/// Case-insensitive lookup key for names
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

use crate::model::{Category, Certification, Skill};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration parsed from folio.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub id_strategy: IdStrategy,
    #[serde(default)]
    pub collections: CollectionNames,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub migrations: MigrationConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// Which document backend the store talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory,
    Sqlite {
        #[serde(default = "default_db_path")]
        path: PathBuf,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Sqlite {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("folio.db")
}

/// How new document ids are generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    Ulid,
    Uuid,
    #[default]
    Nanoid,
    /// Slugified `name` field, suffixed on conflict
    Slug,
}

/// Backing collection names for each entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionNames {
    #[serde(default = "default_projects")]
    pub projects: String,
    #[serde(default = "default_skills")]
    pub skills: String,
    #[serde(default = "default_categories")]
    pub categories: String,
    #[serde(default = "default_certifications")]
    pub certifications: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        CollectionNames {
            projects: default_projects(),
            skills: default_skills(),
            categories: default_categories(),
            certifications: default_certifications(),
        }
    }
}

fn default_projects() -> String {
    "projects".into()
}

fn default_skills() -> String {
    "skills".into()
}

fn default_categories() -> String {
    "categories".into()
}

fn default_certifications() -> String {
    "certifications".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> usize {
    6
}

/// Decides when a reference list counts as already migrated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Skip the document when its first element is a known id.
    /// Mixed lists with a resolved head are skipped entirely.
    #[default]
    FirstElement,
    /// Skip only when every element is a known id
    AllElements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub skip_policy: SkipPolicy,
    #[serde(default = "default_project_category")]
    pub default_project_category: String,
    #[serde(default)]
    pub composite: CompositeDefinition,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            skip_policy: SkipPolicy::default(),
            default_project_category: default_project_category(),
            composite: CompositeDefinition::default(),
        }
    }
}

fn default_project_category() -> String {
    "Web".into()
}

/// A bundled skill and the skills it decomposes into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeDefinition {
    pub name: String,
    pub components: Vec<String>,
}

impl Default for CompositeDefinition {
    fn default() -> Self {
        CompositeDefinition {
            name: "MERN Stack".into(),
            components: vec![
                "MongoDB".into(),
                "Express".into(),
                "React".into(),
                "Node.js".into(),
            ],
        }
    }
}

/// Optional replacements for the built-in seed rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
    #[serde(default)]
    pub skills: Option<Vec<Skill>>,
    #[serde(default)]
    pub certifications: Option<Vec<Certification>>,
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Invalid field '{field}' on {collection}/{id}: {reason}")]
    InvalidField {
        collection: String,
        id: String,
        field: String,
        reason: String,
    },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl FolioError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        FolioError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FolioError>;

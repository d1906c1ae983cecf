pub mod backend;
pub mod config;
pub mod document;
pub mod error;
pub mod migration;
pub mod model;
pub mod query;
pub mod resolver;
pub mod seed;
pub mod store;

pub use config::CatalogConfig;
pub use document::{Document, RawDocument};
pub use error::{FolioError, Result};
pub use migration::{MigrationKind, MigrationOutcome};
pub use query::CatalogQuery;
pub use resolver::ReferenceResolver;
pub use store::{Collection, Store};

use super::types::CatalogConfig;
use crate::error::{FolioError, Result};
use std::path::Path;

/// Parse a folio.yaml file into a CatalogConfig
pub fn parse_config(path: &Path) -> Result<CatalogConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a config YAML string into a CatalogConfig
pub fn parse_config_str(content: &str) -> Result<CatalogConfig> {
    // An empty or null document means "all defaults"
    let config = if content.trim().is_empty() {
        CatalogConfig::default()
    } else {
        serde_yaml::from_str::<Option<CatalogConfig>>(content)?.unwrap_or_default()
    };
    validate_config(&config)?;
    Ok(config)
}

/// Load the config at `path`, or fall back to defaults if the file does not exist.
pub fn load_or_default(path: &Path) -> Result<CatalogConfig> {
    if path.exists() {
        parse_config(path)
    } else {
        log::debug!("No config at {}, using defaults", path.display());
        Ok(CatalogConfig::default())
    }
}

fn validate_config(config: &CatalogConfig) -> Result<()> {
    if config.query.page_size == 0 {
        return Err(FolioError::Config("query.page_size must be at least 1".into()));
    }

    let names = &config.collections;
    for (key, value) in [
        ("projects", &names.projects),
        ("skills", &names.skills),
        ("categories", &names.categories),
        ("certifications", &names.certifications),
    ] {
        if value.trim().is_empty() {
            return Err(FolioError::Config(format!(
                "collections.{key} must not be empty"
            )));
        }
    }

    let composite = &config.migrations.composite;
    if composite.name.trim().is_empty() {
        return Err(FolioError::Config("migrations.composite.name must not be empty".into()));
    }
    if composite.components.is_empty() {
        return Err(FolioError::Config(format!(
            "migrations.composite '{}' lists no components",
            composite.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, IdStrategy, SkipPolicy};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config.query.page_size, 6);
        assert_eq!(config.collections.projects, "projects");
        assert_eq!(config.id_strategy, IdStrategy::Nanoid);
        assert_eq!(config.migrations.skip_policy, SkipPolicy::FirstElement);
        assert_eq!(config.migrations.composite.name, "MERN Stack");
        assert_eq!(config.migrations.composite.components.len(), 4);
    }

    #[test]
    fn test_full_config() {
        let config = parse_config_str(
            r#"
backend:
  kind: memory
id_strategy: slug
collections:
  projects: works
query:
  page_size: 9
migrations:
  skip_policy: all_elements
  default_project_category: Mobile
  composite:
    name: LAMP
    components: [Linux, Apache, MySQL, PHP]
seed:
  skills:
    - { name: Rust, category: backend, proficiency: 70 }
"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendConfig::Memory);
        assert_eq!(config.id_strategy, IdStrategy::Slug);
        assert_eq!(config.collections.projects, "works");
        assert_eq!(config.collections.skills, "skills");
        assert_eq!(config.query.page_size, 9);
        assert_eq!(config.migrations.skip_policy, SkipPolicy::AllElements);
        assert_eq!(config.migrations.default_project_category, "Mobile");
        assert_eq!(config.migrations.composite.components[1], "Apache");
        let skills = config.seed.skills.unwrap();
        assert_eq!(skills[0].name, "Rust");
        assert_eq!(skills[0].proficiency, 70);
    }

    #[test]
    fn test_sqlite_backend_default_path() {
        let config = parse_config_str("backend: { kind: sqlite }").unwrap();
        match config.backend {
            BackendConfig::Sqlite { path } => assert_eq!(path.to_str(), Some("folio.db")),
            other => panic!("Expected sqlite backend, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = parse_config_str("query: { page_size: 0 }");
        assert!(matches!(result, Err(FolioError::Config(_))));
    }

    #[test]
    fn test_composite_without_components_rejected() {
        let result = parse_config_str(
            "migrations:\n  composite: { name: MERN Stack, components: [] }",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&tmp.path().join("folio.yaml")).unwrap();
        assert_eq!(config.query.page_size, 6);
    }
}

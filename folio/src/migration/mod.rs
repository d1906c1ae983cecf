//! Batch data migrations over the catalog collections.
//!
//! Three transforms do the real work:
//!
//! - [`normalize_references`] rewrites name-based reference fields into
//!   id-based ones. Tolerant: unknown names are reported, never raised.
//! - [`seed_if_missing`] inserts lookup rows whose names are not present yet.
//! - [`decompose_composite`] replaces a bundled entry with its components in
//!   every referencing document, then deletes the bundle. Gated: if any
//!   component is missing it aborts before the first write.
//!
//! None of them is transactional. Each document write is independent, and every
//! transform is safe to re-run after a partial failure.

use crate::config::{CatalogConfig, SkipPolicy};
use crate::error::{FolioError, Result};
use crate::model::{name_key, Named, Reference};
use crate::resolver::ReferenceResolver;
use crate::seed;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The migrations an administrator can trigger by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationKind {
    NormalizeProjectReferences,
    NormalizeSkillCategories,
    DecomposeCompositeSkill,
    SeedCategories,
    SeedSkills,
    SeedCertifications,
    BackfillProjectCategories,
    /// Seed skills, seed certifications, then backfill project categories
    PopulateAll,
}

impl MigrationKind {
    pub const ALL: [MigrationKind; 8] = [
        MigrationKind::NormalizeProjectReferences,
        MigrationKind::NormalizeSkillCategories,
        MigrationKind::DecomposeCompositeSkill,
        MigrationKind::SeedCategories,
        MigrationKind::SeedSkills,
        MigrationKind::SeedCertifications,
        MigrationKind::BackfillProjectCategories,
        MigrationKind::PopulateAll,
    ];

    /// Steps of [`MigrationKind::PopulateAll`], in run order
    pub const POPULATE_STEPS: [MigrationKind; 3] = [
        MigrationKind::SeedSkills,
        MigrationKind::SeedCertifications,
        MigrationKind::BackfillProjectCategories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationKind::NormalizeProjectReferences => "normalize-project-references",
            MigrationKind::NormalizeSkillCategories => "normalize-skill-categories",
            MigrationKind::DecomposeCompositeSkill => "decompose-composite-skill",
            MigrationKind::SeedCategories => "seed-categories",
            MigrationKind::SeedSkills => "seed-skills",
            MigrationKind::SeedCertifications => "seed-certifications",
            MigrationKind::BackfillProjectCategories => "backfill-project-categories",
            MigrationKind::PopulateAll => "populate-all",
        }
    }

    /// Human-readable description of this migration.
    pub fn describe(&self) -> &'static str {
        match self {
            MigrationKind::NormalizeProjectReferences => {
                "Rewrite project technology names into skill ids"
            }
            MigrationKind::NormalizeSkillCategories => {
                "Rewrite skill category names into category ids"
            }
            MigrationKind::DecomposeCompositeSkill => {
                "Replace the composite skill with its components and delete it"
            }
            MigrationKind::SeedCategories => "Insert default categories not yet present",
            MigrationKind::SeedSkills => "Insert default skills not yet present",
            MigrationKind::SeedCertifications => "Insert default certifications not yet present",
            MigrationKind::BackfillProjectCategories => {
                "Set the default category on projects without one"
            }
            MigrationKind::PopulateAll => {
                "Seed skills and certifications, then backfill project categories"
            }
        }
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationKind {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self> {
        MigrationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FolioError::Migration(format!("Unknown migration kind '{s}'")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub updated_count: usize,
    /// Documents judged already migrated and not inspected further
    pub skipped_count: usize,
    /// Documents inspected but left as they were
    pub unchanged_count: usize,
    /// Tokens that matched neither an id nor a name, sorted
    pub missing_references: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub inserted_count: usize,
    pub already_present_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub updated_count: usize,
    pub unchanged_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecomposeReport {
    pub composite: String,
    /// False when the composite no longer exists (e.g. an earlier run finished)
    pub composite_found: bool,
    pub updated_source_count: usize,
    pub composite_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortReport {
    pub composite: String,
    pub missing_components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateStep {
    pub kind: MigrationKind,
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateReport {
    pub steps: Vec<PopulateStep>,
}

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    Normalized(NormalizeReport),
    Seeded(SeedReport),
    Backfilled(BackfillReport),
    Decomposed(DecomposeReport),
    /// Outcomes of each step of a batch run
    Populated(PopulateReport),
    /// Precondition failed; nothing was written
    Aborted(AbortReport),
}

impl MigrationOutcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, MigrationOutcome::Aborted(_))
    }

    pub fn summary(&self) -> String {
        match self {
            MigrationOutcome::Normalized(r) => format!(
                "updated {}, skipped {}, unchanged {}, missing [{}]",
                r.updated_count,
                r.skipped_count,
                r.unchanged_count,
                r.missing_references.join(", ")
            ),
            MigrationOutcome::Seeded(r) => format!(
                "inserted {}, already present {}",
                r.inserted_count, r.already_present_count
            ),
            MigrationOutcome::Backfilled(r) => format!(
                "updated {}, unchanged {}",
                r.updated_count, r.unchanged_count
            ),
            MigrationOutcome::Decomposed(r) if !r.composite_found => {
                format!("'{}' not found, nothing to decompose", r.composite)
            }
            MigrationOutcome::Decomposed(r) => format!(
                "'{}' decomposed, updated {} documents",
                r.composite, r.updated_source_count
            ),
            MigrationOutcome::Populated(r) => r
                .steps
                .iter()
                .map(|step| format!("{} ({})", step.kind, step.outcome.summary()))
                .collect::<Vec<_>>()
                .join("; "),
            MigrationOutcome::Aborted(r) => format!(
                "aborted '{}', missing components [{}]",
                r.composite,
                r.missing_components.join(", ")
            ),
        }
    }
}

/// Run a named migration with the collections and options from `config`,
/// and record it in the backend's migration log.
///
/// A failure to write the log entry is logged and does not discard the outcome:
/// the documents have already been changed by then.
pub fn run(store: &Store, config: &CatalogConfig, kind: MigrationKind) -> Result<MigrationOutcome> {
    log::info!("Running migration {kind}");
    let outcome = apply(store, config, kind)?;

    let summary = format!("{kind}: {}", outcome.summary());
    log::info!("{summary}");
    if let Err(e) = store.backend().record_migration(&summary) {
        log::warn!("Migration {kind} finished but could not be recorded: {e}");
    }
    Ok(outcome)
}

fn apply(store: &Store, config: &CatalogConfig, kind: MigrationKind) -> Result<MigrationOutcome> {
    let names = &config.collections;
    let policy = config.migrations.skip_policy;

    let outcome = match kind {
        MigrationKind::NormalizeProjectReferences => MigrationOutcome::Normalized(
            normalize_references(store, &names.projects, "technologies", &names.skills, policy)?,
        ),
        MigrationKind::NormalizeSkillCategories => MigrationOutcome::Normalized(
            normalize_references(store, &names.skills, "category", &names.categories, policy)?,
        ),
        MigrationKind::DecomposeCompositeSkill => {
            let composite = &config.migrations.composite;
            decompose_composite(
                store,
                &composite.name,
                &composite.components,
                &names.projects,
                "technologies",
                &names.skills,
            )?
        }
        MigrationKind::SeedCategories => MigrationOutcome::Seeded(seed_if_missing(
            store,
            &names.categories,
            &seed::categories(&config.seed),
        )?),
        MigrationKind::SeedSkills => MigrationOutcome::Seeded(seed_if_missing(
            store,
            &names.skills,
            &seed::skills(&config.seed),
        )?),
        MigrationKind::SeedCertifications => MigrationOutcome::Seeded(seed_if_missing(
            store,
            &names.certifications,
            &seed::certifications(&config.seed),
        )?),
        MigrationKind::BackfillProjectCategories => MigrationOutcome::Backfilled(backfill_missing(
            store,
            &names.projects,
            "category",
            &config.migrations.default_project_category,
        )?),
        MigrationKind::PopulateAll => {
            let steps = MigrationKind::POPULATE_STEPS
                .into_iter()
                .map(|step| {
                    Ok(PopulateStep {
                        kind: step,
                        outcome: run(store, config, step)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            MigrationOutcome::Populated(PopulateReport { steps })
        }
    };
    Ok(outcome)
}

/// A field holding reference tokens: a list, or one scalar token.
struct ReferenceField {
    tokens: Vec<String>,
    scalar: bool,
}

impl ReferenceField {
    /// None when the field is absent, null, or holds anything but strings.
    fn read(data: &serde_json::Value, field: &str) -> Option<Self> {
        match data.get(field)? {
            serde_json::Value::String(token) => Some(ReferenceField {
                tokens: vec![token.clone()],
                scalar: true,
            }),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(|tokens| ReferenceField {
                    tokens,
                    scalar: false,
                }),
            _ => None,
        }
    }

    /// Write `tokens` back in the field's original shape.
    fn to_value(&self, tokens: Vec<String>) -> serde_json::Value {
        match (self.scalar, tokens.as_slice()) {
            (true, [single]) => serde_json::Value::String(single.clone()),
            _ => serde_json::Value::from(tokens),
        }
    }
}

fn already_migrated(policy: SkipPolicy, refs: &[Reference]) -> bool {
    match policy {
        SkipPolicy::FirstElement => refs.first().map(Reference::is_resolved).unwrap_or(false),
        SkipPolicy::AllElements => !refs.is_empty() && refs.iter().all(Reference::is_resolved),
    }
}

/// Rewrite `field` of every document in `source` so that tokens naming a
/// `target` record become that record's id.
pub fn normalize_references(
    store: &Store,
    source: &str,
    field: &str,
    target: &str,
    policy: SkipPolicy,
) -> Result<NormalizeReport> {
    let mut targets = store.collection(target);
    let resolver = ReferenceResolver::from_documents(targets.refresh()?);

    let mut sources = store.collection(source);
    let snapshot = sources.refresh()?.to_vec();

    let mut report = NormalizeReport::default();
    let mut missing = BTreeSet::new();

    for doc in &snapshot {
        let Some(current) = ReferenceField::read(&doc.data, field) else {
            log::debug!("{source}/{}: no readable '{field}', leaving as is", doc.id);
            report.unchanged_count += 1;
            continue;
        };

        let refs: Vec<Reference> = current.tokens.iter().map(|t| resolver.classify(t)).collect();
        if already_migrated(policy, &refs) {
            log::debug!("{source}/{}: already migrated, skipping", doc.id);
            report.skipped_count += 1;
            continue;
        }

        let mut changed = false;
        let mut rewritten = Vec::with_capacity(refs.len());
        for reference in refs {
            match reference {
                Reference::Resolved(id) => rewritten.push(id),
                Reference::Legacy(name) => match resolver.id_for_name(&name) {
                    Some(id) => {
                        rewritten.push(id.to_string());
                        changed = true;
                    }
                    None => {
                        log::warn!("{source}/{}: no {target} record named '{name}'", doc.id);
                        missing.insert(name.clone());
                        rewritten.push(name);
                    }
                },
            }
        }

        if changed {
            let patch = serde_json::json!({ field: current.to_value(rewritten) });
            sources.update(&doc.id, patch)?;
            report.updated_count += 1;
        } else {
            report.unchanged_count += 1;
        }
    }

    report.missing_references = missing.into_iter().collect();
    Ok(report)
}

/// Insert each candidate whose name (case-insensitive) is not in `target` yet.
pub fn seed_if_missing<T: Named + Serialize>(
    store: &Store,
    target: &str,
    candidates: &[T],
) -> Result<SeedReport> {
    let mut collection = store.collection(target);
    let mut present: BTreeSet<String> = collection
        .refresh()?
        .iter()
        .map(|doc| name_key(doc.data.name()))
        .collect();

    let mut report = SeedReport::default();
    for candidate in candidates {
        // Inserting the key also keeps duplicate candidates from landing twice
        if !present.insert(name_key(candidate.name())) {
            log::debug!("{target}: '{}' already present", candidate.name());
            report.already_present_count += 1;
            continue;
        }
        collection.create_typed(candidate)?;
        report.inserted_count += 1;
    }

    Ok(report)
}

/// Set `field` to `default` on documents where it is absent, null or blank.
pub fn backfill_missing(
    store: &Store,
    collection_name: &str,
    field: &str,
    default: &str,
) -> Result<BackfillReport> {
    let mut collection = store.collection(collection_name);
    let snapshot = collection.refresh()?.to_vec();

    let mut report = BackfillReport::default();
    for doc in &snapshot {
        let needs_value = match doc.data.get(field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if needs_value {
            collection.update(&doc.id, serde_json::json!({ field: default }))?;
            report.updated_count += 1;
        } else {
            report.unchanged_count += 1;
        }
    }

    Ok(report)
}

/// Replace references to the composite `target` record named `composite_name`
/// with references to each of `component_names`, then delete the composite.
///
/// Every component must exist in `target` before anything is written;
/// otherwise the run returns [`MigrationOutcome::Aborted`] untouched.
pub fn decompose_composite(
    store: &Store,
    composite_name: &str,
    component_names: &[String],
    source: &str,
    field: &str,
    target: &str,
) -> Result<MigrationOutcome> {
    let mut targets = store.collection(target);
    let resolver = ReferenceResolver::from_documents(targets.refresh()?);

    let missing_components: Vec<String> = component_names
        .iter()
        .filter(|name| resolver.id_for_name(name).is_none())
        .cloned()
        .collect();
    if !missing_components.is_empty() {
        log::warn!(
            "Not decomposing '{composite_name}': missing components [{}]",
            missing_components.join(", ")
        );
        return Ok(MigrationOutcome::Aborted(AbortReport {
            composite: composite_name.to_string(),
            missing_components,
        }));
    }

    let Some(composite_id) = resolver.id_for_name(composite_name).map(str::to_string) else {
        log::info!("'{composite_name}' not found in {target}, nothing to decompose");
        return Ok(MigrationOutcome::Decomposed(DecomposeReport {
            composite: composite_name.to_string(),
            composite_found: false,
            updated_source_count: 0,
            composite_deleted: false,
        }));
    };

    let composite_key = name_key(composite_name);
    // (id, lowercase name) per component, in the configured order
    let components: Vec<(String, String)> = component_names
        .iter()
        .filter_map(|name| {
            resolver
                .id_for_name(name)
                .map(|id| (id.to_string(), name_key(name)))
        })
        .filter(|(id, _)| *id != composite_id)
        .collect();

    let is_composite = |token: &str| token == composite_id || name_key(token) == composite_key;

    let mut sources = store.collection(source);
    let snapshot = sources.refresh()?.to_vec();
    let mut updated_source_count = 0;

    for doc in &snapshot {
        let Some(current) = ReferenceField::read(&doc.data, field) else {
            continue;
        };
        if current.scalar || !current.tokens.iter().any(|t| is_composite(t.as_str())) {
            continue;
        }

        let mut rewritten: Vec<String> = current
            .tokens
            .iter()
            .filter(|t| !is_composite(t.as_str()))
            .cloned()
            .collect();
        for (id, key) in &components {
            let present = rewritten.iter().any(|t| t == id || name_key(t) == *key);
            if !present {
                rewritten.push(id.clone());
            }
        }

        log::debug!("{source}/{}: replacing '{composite_name}' with components", doc.id);
        sources.update(&doc.id, serde_json::json!({ field: rewritten }))?;
        updated_source_count += 1;
    }

    targets.remove(&composite_id)?;

    Ok(MigrationOutcome::Decomposed(DecomposeReport {
        composite: composite_name.to_string(),
        composite_found: true,
        updated_source_count,
        composite_deleted: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DocumentBackend, MemoryBackend, MigrationRecord, OrderBy};
    use crate::config::{CatalogConfig, IdStrategy};
    use crate::document::RawDocument;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    /// Insert skills by name, returning name -> id
    fn add_skills(store: &Store, names: &[&str]) -> HashMap<String, String> {
        let mut skills = store.collection("skills");
        names
            .iter()
            .map(|name| {
                let id = skills
                    .create(json!({ "name": name, "category": "frontend", "proficiency": 80 }))
                    .unwrap();
                (name.to_string(), id)
            })
            .collect()
    }

    fn add_project(store: &Store, name: &str, technologies: serde_json::Value) -> String {
        store
            .collection("projects")
            .create(json!({ "name": name, "technologies": technologies, "category": "Web" }))
            .unwrap()
    }

    fn technologies(store: &Store, id: &str) -> serde_json::Value {
        store.collection("projects").get(id).unwrap().data["technologies"].clone()
    }

    fn all_projects(store: &Store) -> Vec<RawDocument> {
        let mut projects = store.collection("projects");
        projects.refresh().unwrap().to_vec()
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in MigrationKind::ALL {
            assert_eq!(kind.as_str().parse::<MigrationKind>().unwrap(), kind);
        }
        assert!("drop-everything".parse::<MigrationKind>().is_err());
    }

    #[test]
    fn test_normalize_rewrites_names_to_ids() {
        let store = Store::in_memory();
        let ids = add_skills(&store, &["React", "MongoDB", "Flutter"]);
        let shop = add_project(&store, "Shop", json!(["react", "MongoDB", "jQuery"]));
        let app = add_project(&store, "App", json!(["Flutter"]));

        let report =
            normalize_references(&store, "projects", "technologies", "skills", SkipPolicy::FirstElement)
                .unwrap();

        assert_eq!(report.updated_count, 2);
        assert_eq!(report.skipped_count, 0);
        assert_eq!(report.missing_references, vec!["jQuery".to_string()]);
        assert_eq!(
            technologies(&store, &shop),
            json!([ids["React"], ids["MongoDB"], "jQuery"])
        );
        assert_eq!(technologies(&store, &app), json!([ids["Flutter"]]));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let store = Store::in_memory();
        add_skills(&store, &["React", "MongoDB"]);
        add_project(&store, "Shop", json!(["React", "MongoDB"]));
        add_project(&store, "Legacy", json!(["Backbone"]));
        add_project(&store, "Empty", json!([]));
        let mut plain = store.collection("projects");
        plain.create(json!({ "name": "No field" })).unwrap();

        let first =
            normalize_references(&store, "projects", "technologies", "skills", SkipPolicy::FirstElement)
                .unwrap();
        let after_first = all_projects(&store);

        let second =
            normalize_references(&store, "projects", "technologies", "skills", SkipPolicy::FirstElement)
                .unwrap();
        let after_second = all_projects(&store);

        assert_eq!(first.updated_count, 1);
        assert_eq!(first.unchanged_count, 3);
        assert_eq!(second.updated_count, 0);
        assert_eq!(second.skipped_count, 1);
        assert_eq!(second.missing_references, vec!["Backbone".to_string()]);
        let tech = |docs: &[RawDocument]| -> Vec<serde_json::Value> {
            docs.iter().map(|d| d.data["technologies"].clone()).collect()
        };
        assert_eq!(tech(&after_first), tech(&after_second));
    }

    #[test]
    fn test_first_element_policy_skips_mixed_lists() {
        let store = Store::in_memory();
        let ids = add_skills(&store, &["React", "MongoDB"]);
        let mixed = add_project(&store, "Mixed", json!([ids["React"], "MongoDB"]));

        let report =
            normalize_references(&store, "projects", "technologies", "skills", SkipPolicy::FirstElement)
                .unwrap();
        assert_eq!(report.skipped_count, 1);
        assert_eq!(technologies(&store, &mixed), json!([ids["React"], "MongoDB"]));

        let report =
            normalize_references(&store, "projects", "technologies", "skills", SkipPolicy::AllElements)
                .unwrap();
        assert_eq!(report.updated_count, 1);
        assert_eq!(technologies(&store, &mixed), json!([ids["React"], ids["MongoDB"]]));
    }

    #[test]
    fn test_normalize_scalar_skill_category() {
        let store = Store::in_memory();
        let mut categories = store.collection("categories");
        let frontend = categories.create(json!({ "name": "Frontend" })).unwrap();
        let ids = add_skills(&store, &["React"]);
        let mut skills = store.collection("skills");
        let odd = skills
            .create(json!({ "name": "Ansible", "category": "devops" }))
            .unwrap();

        let report =
            normalize_references(&store, "skills", "category", "categories", SkipPolicy::FirstElement)
                .unwrap();

        assert_eq!(report.updated_count, 1);
        assert_eq!(report.missing_references, vec!["devops".to_string()]);
        assert_eq!(skills.get(&ids["React"]).unwrap().data["category"], json!(frontend));
        assert_eq!(skills.get(&odd).unwrap().data["category"], json!("devops"));

        let again =
            normalize_references(&store, "skills", "category", "categories", SkipPolicy::FirstElement)
                .unwrap();
        assert_eq!(again.updated_count, 0);
        assert_eq!(again.skipped_count, 1);
    }

    #[test]
    fn test_seed_if_missing_skips_existing_names() {
        let store = Store::in_memory();
        add_skills(&store, &["react"]);

        let candidates = vec![
            json!({ "name": "React", "proficiency": 90 }),
            json!({ "name": "Git", "proficiency": 90 }),
            json!({ "name": "GIT", "proficiency": 10 }),
        ];
        let report = seed_if_missing(&store, "skills", &candidates).unwrap();
        assert_eq!(
            report,
            SeedReport {
                inserted_count: 1,
                already_present_count: 2
            }
        );

        let again = seed_if_missing(&store, "skills", &candidates).unwrap();
        assert_eq!(again.inserted_count, 0);
        assert_eq!(again.already_present_count, 3);

        let mut skills = store.collection("skills");
        assert_eq!(skills.refresh().unwrap().len(), 2);
    }

    #[test]
    fn test_decompose_aborts_when_component_missing() {
        let store = Store::in_memory();
        let ids = add_skills(&store, &["MERN Stack", "MongoDB", "React", "Node.js"]);
        add_project(&store, "Shop", json!([ids["MERN Stack"], ids["React"]]));
        add_project(&store, "Blog", json!(["MERN Stack"]));
        let before = all_projects(&store);

        let components: Vec<String> = ["MongoDB", "Express", "React", "Node.js"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcome =
            decompose_composite(&store, "MERN Stack", &components, "projects", "technologies", "skills")
                .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::Aborted(AbortReport {
                composite: "MERN Stack".into(),
                missing_components: vec!["Express".into()],
            })
        );
        assert_eq!(all_projects(&store), before);
        assert!(store.collection("skills").get(&ids["MERN Stack"]).is_ok());
    }

    #[test]
    fn test_decompose_rewrites_and_deletes_composite() {
        let store = Store::in_memory();
        let ids = add_skills(
            &store,
            &["MERN Stack", "MongoDB", "Express", "React", "Node.js", "Flutter"],
        );
        let shop = add_project(&store, "Shop", json!([ids["MERN Stack"], ids["React"]]));
        let blog = add_project(&store, "Blog", json!(["mern stack", "Express"]));
        let app = add_project(&store, "App", json!([ids["Flutter"]]));

        let components: Vec<String> = ["MongoDB", "Express", "React", "Node.js"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let outcome =
            decompose_composite(&store, "MERN Stack", &components, "projects", "technologies", "skills")
                .unwrap();

        assert_eq!(
            outcome,
            MigrationOutcome::Decomposed(DecomposeReport {
                composite: "MERN Stack".into(),
                composite_found: true,
                updated_source_count: 2,
                composite_deleted: true,
            })
        );
        assert_eq!(
            technologies(&store, &shop),
            json!([ids["React"], ids["MongoDB"], ids["Express"], ids["Node.js"]])
        );
        // the literal "Express" already covers that component
        assert_eq!(
            technologies(&store, &blog),
            json!(["Express", ids["MongoDB"], ids["React"], ids["Node.js"]])
        );
        assert_eq!(technologies(&store, &app), json!([ids["Flutter"]]));
        assert!(matches!(
            store.collection("skills").get(&ids["MERN Stack"]),
            Err(FolioError::NotFound { .. })
        ));
    }

    #[test]
    fn test_decompose_rerun_is_noop() {
        let store = Store::in_memory();
        let ids = add_skills(&store, &["MERN Stack", "MongoDB", "Express", "React", "Node.js"]);
        let shop = add_project(&store, "Shop", json!([ids["MERN Stack"]]));
        let config = CatalogConfig::default();

        let first = run(&store, &config, MigrationKind::DecomposeCompositeSkill).unwrap();
        assert!(!first.is_aborted());
        let after_first = technologies(&store, &shop);

        let second = run(&store, &config, MigrationKind::DecomposeCompositeSkill).unwrap();
        match second {
            MigrationOutcome::Decomposed(report) => {
                assert!(!report.composite_found);
                assert_eq!(report.updated_source_count, 0);
            }
            other => panic!("Expected Decomposed, got {other:?}"),
        }
        assert_eq!(technologies(&store, &shop), after_first);
    }

    #[test]
    fn test_backfill_project_categories() {
        let store = Store::in_memory();
        let mut projects = store.collection("projects");
        let none = projects.create(json!({ "name": "A" })).unwrap();
        let blank = projects.create(json!({ "name": "B", "category": " " })).unwrap();
        let set = projects.create(json!({ "name": "C", "category": "Mobile" })).unwrap();

        let outcome = run(&store, &CatalogConfig::default(), MigrationKind::BackfillProjectCategories)
            .unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Backfilled(BackfillReport {
                updated_count: 2,
                unchanged_count: 1
            })
        );
        assert_eq!(projects.get(&none).unwrap().data["category"], "Web");
        assert_eq!(projects.get(&blank).unwrap().data["category"], "Web");
        assert_eq!(projects.get(&set).unwrap().data["category"], "Mobile");
    }

    #[test]
    fn test_full_seed_and_migrate_flow() {
        let store = Store::in_memory();
        let config = CatalogConfig::default();
        let legacy = add_project(&store, "Shop", json!(["React", "MERN Stack"]));

        for kind in [
            MigrationKind::SeedCategories,
            MigrationKind::SeedSkills,
            MigrationKind::SeedCertifications,
            MigrationKind::NormalizeSkillCategories,
            MigrationKind::NormalizeProjectReferences,
            MigrationKind::DecomposeCompositeSkill,
        ] {
            let outcome = run(&store, &config, kind).unwrap();
            assert!(!outcome.is_aborted(), "{kind} aborted");
        }

        let mut skills = store.collection("skills");
        let resolver = ReferenceResolver::from_documents(skills.refresh().unwrap());
        let tech = technologies(&store, &legacy);
        let names: Vec<&str> = tech
            .as_array()
            .unwrap()
            .iter()
            .map(|t| {
                let token = t.as_str().unwrap();
                assert!(resolver.is_known_id(token), "{token} is not a skill id");
                resolver.resolve(token)
            })
            .collect();
        assert_eq!(names, ["React", "MongoDB", "Express", "Node.js"]);

        let history = store.migration_history().unwrap();
        assert_eq!(history.len(), 6);
        assert!(history[0].description.starts_with("seed-categories: inserted 6"));

        // only the decomposed composite comes back
        match run(&store, &config, MigrationKind::SeedSkills).unwrap() {
            MigrationOutcome::Seeded(report) => assert_eq!(report.inserted_count, 1),
            other => panic!("Expected Seeded, got {other:?}"),
        }
    }

    /// Memory backend that cannot write its migration log
    struct NoLog(MemoryBackend);

    impl DocumentBackend for NoLog {
        fn insert(&self, collection: &str, doc: &RawDocument) -> Result<()> {
            self.0.insert(collection, doc)
        }
        fn get(&self, collection: &str, id: &str) -> Result<Option<RawDocument>> {
            self.0.get(collection, id)
        }
        fn get_all(&self, collection: &str, order: Option<&OrderBy>) -> Result<Vec<RawDocument>> {
            self.0.get_all(collection, order)
        }
        fn update(
            &self,
            collection: &str,
            id: &str,
            patch: &serde_json::Map<String, serde_json::Value>,
            updated_at: chrono::DateTime<chrono::Utc>,
        ) -> Result<()> {
            self.0.update(collection, id, patch, updated_at)
        }
        fn delete(&self, collection: &str, id: &str) -> Result<()> {
            self.0.delete(collection, id)
        }
        fn collections(&self) -> Result<Vec<String>> {
            self.0.collections()
        }
        fn record_migration(&self, _: &str) -> Result<()> {
            Err(FolioError::Backend("disk full".into()))
        }
        fn migration_history(&self) -> Result<Vec<MigrationRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_outcome_survives_unrecorded_migration() {
        let store = Store::with_backend(Box::new(NoLog(MemoryBackend::new())), IdStrategy::Nanoid);
        let id = add_project(&store, "Shop", json!(["React"]));
        add_skills(&store, &["React"]);

        let outcome = run(&store, &CatalogConfig::default(), MigrationKind::NormalizeProjectReferences)
            .unwrap();
        match outcome {
            MigrationOutcome::Normalized(report) => assert_eq!(report.updated_count, 1),
            other => panic!("Expected Normalized, got {other:?}"),
        }
        let tech = technologies(&store, &id);
        assert_ne!(tech, json!(["React"]));
        assert!(store.migration_history().unwrap().is_empty());
    }

    #[test]
    fn test_populate_all_runs_steps_in_order() {
        let store = Store::in_memory();
        let config = CatalogConfig::default();
        let mut projects = store.collection("projects");
        let bare = projects.create(json!({ "name": "Shop" })).unwrap();

        let outcome = run(&store, &config, MigrationKind::PopulateAll).unwrap();
        let steps = match &outcome {
            MigrationOutcome::Populated(report) => &report.steps,
            other => panic!("Expected Populated, got {other:?}"),
        };
        let kinds: Vec<MigrationKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, MigrationKind::POPULATE_STEPS);
        assert!(matches!(steps[0].outcome, MigrationOutcome::Seeded(ref r) if r.inserted_count > 0));
        assert!(matches!(steps[1].outcome, MigrationOutcome::Seeded(ref r) if r.inserted_count > 0));
        assert_eq!(
            steps[2].outcome,
            MigrationOutcome::Backfilled(BackfillReport {
                updated_count: 1,
                unchanged_count: 0
            })
        );
        assert_eq!(projects.get(&bare).unwrap().data["category"], "Web");

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "populated");
        assert_eq!(json["steps"][2]["kind"], "backfill-project-categories");
        assert_eq!(json["steps"][2]["outcome"], "backfilled");

        // each step is logged, then the batch itself
        let history = store.migration_history().unwrap();
        assert_eq!(history.len(), 4);
        assert!(history[3].description.starts_with("populate-all: seed-skills (inserted"));

        match run(&store, &config, MigrationKind::PopulateAll).unwrap() {
            MigrationOutcome::Populated(report) => {
                for step in report.steps {
                    assert!(
                        matches!(
                            step.outcome,
                            MigrationOutcome::Seeded(SeedReport { inserted_count: 0, .. })
                                | MigrationOutcome::Backfilled(BackfillReport { updated_count: 0, .. })
                        ),
                        "{} changed data on rerun",
                        step.kind
                    );
                }
            }
            other => panic!("Expected Populated, got {other:?}"),
        }
    }
}

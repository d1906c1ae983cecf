use clap::{Parser, Subcommand, ValueEnum};
use folio::backend::Direction;
use folio::config::{self, BackendConfig};
use folio::migration::{self, MigrationKind};
use folio::query::Filters;
use folio::{CatalogConfig, CatalogQuery, Store};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

/// Folio CLI: manage and query a portfolio catalog from the command line
#[derive(Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Path to the catalog config file
    #[arg(long, default_value = "folio.yaml")]
    config: PathBuf,

    /// Use this SQLite database instead of the configured backend
    #[arg(long)]
    db: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for Direction {
    fn from(d: SortDirection) -> Self {
        match d {
            SortDirection::Asc => Direction::Asc,
            SortDirection::Desc => Direction::Desc,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Get a single document by ID
    Get {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
    },

    /// List documents in a collection
    List {
        /// Collection name
        collection: String,
        /// Field to order by (e.g. --order-by createdAt)
        #[arg(long)]
        order_by: Option<String>,
        #[arg(long, default_value = "asc")]
        direction: SortDirection,
    },

    /// Insert a new document
    Insert {
        /// Collection name
        collection: String,
        /// Field values (e.g. --field name="Tailwind CSS")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Whole document as a JSON object; --field values are merged on top
        #[arg(long)]
        data: Option<String>,
    },

    /// Update an existing document
    Update {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
        /// Field values to update (e.g. --field featured=true)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a document
    Delete {
        /// Collection name
        collection: String,
        /// Document ID
        id: String,
        /// Show what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a data migration, or list them when no kind is given
    Migrate {
        /// e.g. normalize-project-references
        kind: Option<String>,
    },

    /// Show applied migrations
    History,

    /// Search and filter projects
    Search {
        /// Free-text query over name, description and technologies
        #[arg(long, short)]
        query: Option<String>,
        /// Category to include (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Technology display name to include (repeatable)
        #[arg(long = "tech")]
        technologies: Vec<String>,
        #[arg(long)]
        featured: bool,
        #[arg(long)]
        has_live_url: bool,
        #[arg(long, alias = "has-github-url")]
        has_source_url: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Show every selectable category and technology
    Facets,

    /// Show project counts per technology and category
    Stats,

    /// Show backend, collection counts and migration count
    Status,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> folio::Result<CatalogConfig> {
    let mut config = config::load_or_default(&cli.config)?;
    if let Some(path) = &cli.db {
        config.backend = BackendConfig::Sqlite { path: path.clone() };
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let store = Store::open(&config)?;
    log::debug!("Opened store with {:?} backend", config.backend);

    match cli.command {
        Command::Get { collection, id } => {
            let doc = store.collection(&collection).get(&id)?;
            print_output(&doc, &cli.format)?;
        }

        Command::List {
            collection,
            order_by,
            direction,
        } => {
            let mut handle = store.collection(&collection);
            if let Some(field) = order_by {
                handle = handle.ordered_by(&field, direction.into());
            }
            let docs = handle.refresh()?;
            print_output(&docs, &cli.format)?;
        }

        Command::Insert {
            collection,
            fields,
            data,
        } => {
            let mut value = match data {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Object(Default::default()),
            };
            if let (Some(map), serde_json::Value::Object(extra)) =
                (value.as_object_mut(), fields_to_value(&fields))
            {
                map.extend(extra);
            }
            let id = store.collection(&collection).create(value)?;
            print_output(&serde_json::json!({ "id": id }), &cli.format)?;
        }

        Command::Update {
            collection,
            id,
            fields,
        } => {
            store
                .collection(&collection)
                .update(&id, fields_to_value(&fields))?;
            print_output(&serde_json::json!({ "ok": true, "id": id }), &cli.format)?;
        }

        Command::Delete {
            collection,
            id,
            dry_run,
        } => {
            let mut handle = store.collection(&collection);
            if dry_run {
                let doc = handle.get(&id)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "collection": collection, "id": id },
                        "document": doc,
                    }),
                    &cli.format,
                )?;
            } else {
                handle.remove(&id)?;
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Migrate { kind: None } => {
            let kinds: Vec<_> = MigrationKind::ALL
                .iter()
                .map(|k| serde_json::json!({ "kind": k, "description": k.describe() }))
                .collect();
            print_output(&kinds, &cli.format)?;
        }

        Command::Migrate { kind: Some(kind) } => {
            let kind: MigrationKind = kind.parse()?;
            let outcome = migration::run(&store, &config, kind)?;
            print_output(&outcome, &cli.format)?;
            if outcome.is_aborted() {
                return Err(format!("{kind} aborted: {}", outcome.summary()).into());
            }
        }

        Command::History => {
            print_output(&store.migration_history()?, &cli.format)?;
        }

        Command::Search {
            query: text,
            categories,
            technologies,
            featured,
            has_live_url,
            has_source_url,
            page,
        } => {
            let mut query = CatalogQuery::load(&store, &config)?;
            query.set_filters(Filters {
                categories,
                technologies,
                featured,
                has_live_url,
                has_source_url,
            });
            if let Some(text) = text {
                query.set_search_query(text);
            }
            query.set_current_page(page);
            print_output(
                &serde_json::json!({
                    "results": query.current_page_results(),
                    "pageInfo": query.page_info(),
                    "activeFilterCount": query.active_filter_count(),
                }),
                &cli.format,
            )?;
        }

        Command::Facets => {
            let query = CatalogQuery::load(&store, &config)?;
            print_output(query.facets(), &cli.format)?;
        }

        Command::Stats => {
            let query = CatalogQuery::load(&store, &config)?;
            print_output(&query.stats(), &cli.format)?;
        }

        Command::Status => {
            print_output(&store.status()?, &cli.format)?;
        }
    }

    Ok(())
}

fn print_output<T: Serialize + ?Sized>(
    value: &T,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn fields_to_value(fields: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    serde_json::Value::Object(map)
}

use actix_web::{web, HttpResponse};
use folio::migration::{self, MigrationKind};
use folio::query::Filters;
use folio::{CatalogQuery, FolioError};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Status
            .route("/status", web::get().to(status))
            // Portfolio query
            .route("/portfolio", web::get().to(portfolio))
            .route("/portfolio/facets", web::get().to(facets))
            .route("/portfolio/stats", web::get().to(stats))
            // Migrations
            .route("/migrations", web::get().to(migration_history))
            .route("/migrations/{kind}", web::post().to(run_migration))
            // Collections, under their own prefix so any name is addressable
            .route("/collections/{collection}", web::get().to(list_documents))
            .route("/collections/{collection}", web::post().to(create_document))
            .route("/collections/{collection}/{id}", web::get().to(get_document))
            .route("/collections/{collection}/{id}", web::put().to(update_document))
            .route("/collections/{collection}/{id}", web::delete().to(delete_document)),
    );
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json<T: Serialize>(value: T) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn created_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Created().json(value)
}

fn err_response(e: FolioError) -> HttpResponse {
    match &e {
        FolioError::NotFound { .. } => HttpResponse::NotFound().json(serde_json::json!({
            "error": e.to_string()
        })),
        FolioError::InvalidField { .. } | FolioError::Config(_) | FolioError::Migration(_) => {
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            }))
        }
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

async fn status(state: web::Data<AppState>) -> HttpResponse {
    match state.store.lock().status() {
        Ok(v) => ok_json(v),
        Err(e) => err_response(e),
    }
}

// ── Portfolio ───────────────────────────────────────────────────────

/// List dimensions are comma-separated, e.g. `?categories=Web,Mobile`
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PortfolioParams {
    q: Option<String>,
    categories: Option<String>,
    technologies: Option<String>,
    featured: bool,
    has_live_url: bool,
    #[serde(alias = "hasGithubUrl")]
    has_source_url: bool,
    page: Option<usize>,
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn load_query(state: &AppState) -> folio::Result<CatalogQuery> {
    let store = state.store.lock();
    CatalogQuery::load(&store, &state.config)
}

async fn portfolio(state: web::Data<AppState>, params: web::Query<PortfolioParams>) -> HttpResponse {
    let mut query = match load_query(&state) {
        Ok(q) => q,
        Err(e) => return err_response(e),
    };

    query.set_filters(Filters {
        categories: split_list(params.categories.as_deref()),
        technologies: split_list(params.technologies.as_deref()),
        featured: params.featured,
        has_live_url: params.has_live_url,
        has_source_url: params.has_source_url,
    });
    if let Some(q) = &params.q {
        query.set_search_query(q.as_str());
    }
    if let Some(page) = params.page {
        query.set_current_page(page);
    }

    ok_json(serde_json::json!({
        "results": query.current_page_results(),
        "pageInfo": query.page_info(),
        "filters": query.filters(),
        "activeFilterCount": query.active_filter_count(),
    }))
}

async fn facets(state: web::Data<AppState>) -> HttpResponse {
    match load_query(&state) {
        Ok(query) => ok_json(query.facets()),
        Err(e) => err_response(e),
    }
}

async fn stats(state: web::Data<AppState>) -> HttpResponse {
    match load_query(&state) {
        Ok(query) => ok_json(query.stats()),
        Err(e) => err_response(e),
    }
}

// ── Migrations ──────────────────────────────────────────────────────

async fn migration_history(state: web::Data<AppState>) -> HttpResponse {
    let kinds: Vec<_> = MigrationKind::ALL
        .iter()
        .map(|k| serde_json::json!({ "kind": k, "description": k.describe() }))
        .collect();
    match state.store.lock().migration_history() {
        Ok(history) => ok_json(serde_json::json!({ "available": kinds, "applied": history })),
        Err(e) => err_response(e),
    }
}

async fn run_migration(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let kind: MigrationKind = match path.parse() {
        Ok(k) => k,
        Err(e) => return err_response(e),
    };
    let store = state.store.lock();
    match migration::run(&store, &state.config, kind) {
        Ok(outcome) if outcome.is_aborted() => HttpResponse::Conflict().json(outcome),
        Ok(outcome) => ok_json(outcome),
        Err(e) => err_response(e),
    }
}

// ── Collections ─────────────────────────────────────────────────────

async fn list_documents(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let store = state.store.lock();
    let mut collection = store.collection(&path);
    match collection.refresh() {
        Ok(docs) => ok_json(docs),
        Err(e) => err_response(e),
    }
}

async fn get_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    match state.store.lock().collection(&collection).get(&id) {
        Ok(doc) => ok_json(doc),
        Err(e) => err_response(e),
    }
}

async fn create_document(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    match state.store.lock().collection(&path).create(body.into_inner()) {
        Ok(id) => created_json(serde_json::json!({ "id": id })),
        Err(e) => err_response(e),
    }
}

async fn update_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    match state
        .store
        .lock()
        .collection(&collection)
        .update(&id, body.into_inner())
    {
        Ok(()) => ok_json(serde_json::json!({ "ok": true, "id": id })),
        Err(e) => err_response(e),
    }
}

async fn delete_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    match state.store.lock().collection(&collection).remove(&id) {
        Ok(()) => ok_json(serde_json::json!({ "ok": true, "deleted": id })),
        Err(e) => err_response(e),
    }
}

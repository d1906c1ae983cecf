use actix_web::{web, App, HttpServer};
use folio::{CatalogConfig, Store};
use parking_lot::Mutex;
use std::path::PathBuf;

mod handlers;

/// Shared application state
pub struct AppState {
    /// The SQLite connection is not `Sync`; requests take turns
    pub store: Mutex<Store>,
    pub config: CatalogConfig,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting folio server");

    let config_path = std::env::var("FOLIO_CONFIG").unwrap_or_else(|_| "folio.yaml".to_string());
    let host = std::env::var("FOLIO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("FOLIO_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Loading config from: {config_path}");
    let config = folio::config::load_or_default(&PathBuf::from(&config_path)).map_err(io_error)?;
    let store = Store::open(&config).map_err(io_error)?;

    let state = web::Data::new(AppState {
        store: Mutex::new(store),
        config,
    });

    log::info!("Listening on {host}:{port}");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

fn io_error(e: folio::FolioError) -> std::io::Error {
    log::error!("Failed to open catalog: {e}");
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

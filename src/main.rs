use std::sync::Arc;

use patter_server::{
    config::Config, files::DiskFileStore, http, registry::ConnectionRegistry, relay,
    store::SqliteMessageStore, AppState,
};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Refuse to serve without a working persistence layer
    let store = match SqliteMessageStore::connect(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            error!(
                "failed to open message store at {}: {}",
                config.database_url, e
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        error!(
            "failed to create upload directory {}: {}",
            config.upload_dir.display(),
            e
        );
        std::process::exit(1);
    }
    let files = DiskFileStore::new(config.upload_dir.clone(), config.public_base_url.clone());

    let ws_listener = match TcpListener::bind(&config.ws_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind relay to {}: {}", config.ws_addr, e);
            std::process::exit(1);
        }
    };
    let http_listener = match TcpListener::bind(&config.http_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind http server to {}: {}", config.http_addr, e);
            std::process::exit(1);
        }
    };

    info!("relay listening on ws://{}", config.ws_addr);
    info!("history service listening on http://{}", config.http_addr);

    let state = Arc::new(AppState {
        registry: ConnectionRegistry::new(),
        store: Arc::new(store),
        files: Arc::new(files),
        config,
    });

    tokio::spawn(relay::accept_loop(ws_listener, state.clone()));

    if let Err(e) = axum::serve(http_listener, http::router(state)).await {
        error!("http server exited: {}", e);
        std::process::exit(1);
    }
}

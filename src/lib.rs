use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod denominations;
pub mod error;
pub mod numbering;
pub mod render;
pub mod routes;
pub mod words;

use config::Config;
use db::DbPool;
use render::ReceiptRenderer;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub renderer: Arc<dyn ReceiptRenderer>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbPool, renderer: Arc<dyn ReceiptRenderer>, config: Config) -> Self {
        Self {
            db,
            renderer,
            config: Arc::new(config),
        }
    }
}

/// Create the receipts and images directories if they are missing.
pub async fn prepare_storage(config: &Config) -> std::io::Result<()> {
    for dir in [&config.storage.receipts_dir, &config.storage.images_dir] {
        if !tokio::fs::try_exists(dir).await? {
            tokio::fs::create_dir_all(dir).await?;
            tracing::info!("Created directory {}", dir.display());
        }
    }
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let receipts_dir = state.config.storage.receipts_dir.clone();
    let images_dir = state.config.storage.images_dir.clone();
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/receipt", post(routes::receipts::create_receipt))
        .route("/api/download/{filename}", get(routes::receipts::download_receipt))
        .route(
            "/api/receipts",
            get(routes::records::list_records).post(routes::records::create_record),
        )
        .nest_service("/receipts", ServeDir::new(receipts_dir))
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = config
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn health_check() -> &'static str {
    "OK"
}

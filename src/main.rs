// src/main.rs

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod blob_store;
mod catalog;
mod cloudinary;
mod draft;
mod errors;
mod forms;
mod htmx_handlers;
mod image_pipeline;
mod models;
mod response;
mod state;
mod validation;

use crate::catalog::CatalogApiClient;
use crate::cloudinary::CloudinaryStore;
use crate::htmx_handlers::*;
use crate::state::{AppConfig, AppState};

// 5 zdjęć prosto z aparatu, z zapasem
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/products/new", get(new_product_form_handler))
        .route("/admin/products/{id}/edit", get(edit_product_form_handler))
        .route("/htmx/forms/{form_id}/fields", post(update_form_fields_handler))
        .route("/htmx/forms/{form_id}/images", post(upload_form_images_handler))
        .route(
            "/htmx/forms/{form_id}/images/{index}/remove",
            post(remove_form_image_handler),
        )
        .route("/htmx/forms/{form_id}/submit", post(submit_form_handler))
        .route("/htmx/forms/{form_id}/cancel", post(cancel_form_handler))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Inicjalizacja systemu logowania (tracing)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "product_form=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Inicjalizacja serwera formularza produktów...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Nieprawidłowa konfiguracja: {}", err);
            std::process::exit(1);
        }
    };

    let blob_store = Arc::new(CloudinaryStore::new(config.cloudinary.clone()));
    let catalog = Arc::new(CatalogApiClient::new(config.catalog_api_url.clone()));
    let addr = config.bind_addr;
    let app_state = Arc::new(AppState::new(config, blob_store, catalog));

    let app = router(app_state);

    tracing::info!("Serwer nasłuchuje na {}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Nie można powiązać adresu {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Błąd serwera: {}", e);
    }
}

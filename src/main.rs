//! Innov'Events Backend
//!
//! REST backend for the event agency: events, quotes (devis) and their
//! lifecycle, with SQLite persistence and Tantivy quote search.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod search;
mod workflow;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use search::{QuoteDocument, QuoteIndex};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<QuoteIndex>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting Innov'Events Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Default VAT rate: {}%", config.default_vat_rate);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (INNOV_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(QuoteIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building quote index...");
    let event_names: HashMap<String, String> = repo
        .list_events()
        .await?
        .into_iter()
        .map(|event| (event.id, event.name))
        .collect();
    let quotes = repo.list_quotes(None, None).await?;
    let documents: Vec<QuoteDocument<'_>> = quotes
        .iter()
        .map(|quote| QuoteDocument {
            quote,
            event_name: event_names
                .get(&quote.event_id)
                .map(String::as_str)
                .unwrap_or_default(),
        })
        .collect();
    search.rebuild(&documents).await?;

    // Create application state
    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        .route("/revision", get(api::get_revision))
        // Events
        .route("/events", get(api::list_events).post(api::create_event))
        .route(
            "/events/{id}",
            get(api::get_event)
                .put(api::update_event)
                .delete(api::delete_event),
        )
        // Quotes
        .route("/devis", get(api::list_quotes).post(api::create_quote))
        .route("/devis/search", get(api::search_quotes))
        .route(
            "/devis/{id}",
            get(api::get_quote)
                .put(api::update_quote)
                .delete(api::delete_quote),
        )
        .route("/devis/{id}/actions", get(api::get_quote_actions))
        .route("/devis/{id}/send", post(api::send_quote))
        .route("/devis/{id}/review", post(api::review_quote))
        .route("/devis/{id}/accept", post(api::accept_quote))
        .route("/devis/{id}/refuse", post(api::refuse_quote))
        .route("/devis/{id}/modify", post(api::request_quote_modification))
        // Activity log
        .route("/activity", get(api::list_activity))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

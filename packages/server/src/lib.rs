//! GuildScope HTTP backend
//!
//! REST API over a loaded dataset: record lookup and scans, the effective
//! hierarchy, hierarchy override editing, comment threads and account
//! administration.
//!
//! # Architecture
//!
//! Endpoints are grouped into modules, each contributing a `routes(state)`
//! router merged in [`create_router`]:
//! - `record_endpoints`: health, record lookup, scans and distinct values
//! - `hierarchy_endpoints`: children, effective parent, ancestors, candidates
//! - `override_endpoints`: list and save hierarchy overrides
//! - `comment_endpoints`: list and post comments
//! - `account_endpoints`: registration, approval, token introspection
//!
//! # Usage
//!
//! ```bash
//! GUILDSCOPE_ADMIN_TOKEN=secret cargo run --bin guildscope-server
//! ```
//!
//! # Security
//!
//! - Reads are public
//! - Posting comments needs an approved account token
//! - Saving overrides needs an approved account with edit rights
//! - Account approval needs the admin token

use axum::{
    http::{header, Method},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use guildscope_core::db::{
    dataset, AccountStore, DatabaseService, DatasetColumns, InMemoryRecordStore, OverrideStore,
    RecordStore, SqliteAccountStore, SqliteCommentStore, SqliteOverrideStore,
};
use guildscope_core::services::ExplorerContext;

pub mod auth;
pub mod config;

mod account_endpoints;
mod comment_endpoints;
mod hierarchy_endpoints;
mod override_endpoints;
mod record_endpoints;

// Shared HTTP error handling
mod http_error;

pub use config::ServerConfig;
pub use http_error::HttpError;

/// Application state shared across all endpoints
///
/// The context owns the dataset, the resolver and the editing services. The
/// override and account stores are also held directly: listing overrides and
/// account administration bypass the session services.
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ExplorerContext>,
    pub overrides: Arc<dyn OverrideStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Build the state over a loaded dataset and an initialized application
    /// database
    pub async fn load(
        records: Arc<InMemoryRecordStore>,
        db: DatabaseService,
        admin_token: Option<String>,
    ) -> anyhow::Result<Self> {
        let overrides: Arc<dyn OverrideStore> = Arc::new(SqliteOverrideStore::new(db.clone()));
        let comments = Arc::new(SqliteCommentStore::new(db.clone()));
        let accounts: Arc<dyn AccountStore> = Arc::new(SqliteAccountStore::new(db));

        let context =
            ExplorerContext::load_in_memory(records, overrides.clone(), comments).await?;

        Ok(Self {
            context: Arc::new(context),
            overrides,
            accounts,
            admin_token: admin_token.map(Arc::from),
        })
    }
}

/// Create the main application router with all endpoint modules
pub fn create_router(state: AppState) -> Router {
    create_router_with_cors(state, None)
}

/// Create the router with an explicit CORS origin (local dev origins if `None`)
pub fn create_router_with_cors(state: AppState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .merge(record_endpoints::routes(state.clone()))
        .merge(hierarchy_endpoints::routes(state.clone()))
        .merge(override_endpoints::routes(state.clone()))
        .merge(comment_endpoints::routes(state.clone()))
        .merge(account_endpoints::routes(state))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

/// CORS layer
///
/// Allows the common local frontend ports unless a single origin is
/// configured through `CORS_ALLOW_ORIGIN`. An unparsable origin falls back to
/// the defaults with a warning.
fn cors_layer(custom_origin: Option<&str>) -> CorsLayer {
    let default_origins = [
        "http://localhost:1420",
        "http://localhost:5173",
        "http://localhost:3000",
    ];

    let custom = custom_origin.and_then(|origin| match origin.parse::<header::HeaderValue>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid CORS_ALLOW_ORIGIN: {}", origin);
            None
        }
    });

    let origins: Vec<header::HeaderValue> = match custom {
        Some(value) => vec![value],
        None => default_origins
            .iter()
            .map(|o| header::HeaderValue::from_static(o))
            .collect(),
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_credentials(false)
}

/// Start the HTTP server
///
/// Opens the application database (creating its schema), loads the dataset
/// table into memory and serves until the process exits.
///
/// # Errors
///
/// Returns error if either database cannot be opened, the dataset table
/// cannot be read, or the server fails to bind.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let db = DatabaseService::new(config.db_path.clone()).await?;
    tracing::info!("📦 Application database: {}", config.db_path.display());

    let dataset_db = DatabaseService::open(config.dataset_path.clone()).await?;
    let columns = DatasetColumns {
        id: config.dataset_key.clone(),
        ..DatasetColumns::default()
    };
    let records = dataset::load_store(&dataset_db, &config.dataset_table, &columns).await?;
    tracing::info!(
        "📚 Dataset: {} ({} records from table {})",
        config.dataset_path.display(),
        records.len(),
        config.dataset_table
    );

    let state = AppState::load(Arc::new(records), db, config.admin_token.clone()).await?;
    let app = create_router_with_cors(state, config.cors_origin.as_deref());

    let addr = config.bind_addr();
    tracing::info!("🚀 HTTP server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("✅ Server ready, listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

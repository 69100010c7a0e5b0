#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the notion map viewer and extension.
//!
//! Serves the rendered map view of a Notion database (filtered, grouped,
//! offset, clustered), the schema-driven save form, page extraction for
//! posted HTML snapshots, and a redirect to the latest extension build.
//! All database access goes through a [`NotionStore`], so the server runs
//! against the live API or any other implementation of the trait.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use notion_map_extractor::ExtractorRegistry;
use notion_map_notion::{NotionClient, NotionConfig, NotionError, NotionStore, SchemaCache};

/// File-name suffix of the packaged extension asset.
pub const EXTENSION_ASSET_SUFFIX: &str = ".zip";

/// Where the extension's releases are published.
#[derive(Debug, Clone)]
pub struct ReleaseFeed {
    /// Repository in `owner/name` form.
    pub repo: String,
    /// GitHub-compatible API base URL.
    pub api_url: String,
}

/// Shared application state.
pub struct AppState {
    /// Notion-compatible store, usually schema-cached.
    pub store: Arc<dyn NotionStore>,
    /// Page extractors for `POST /api/extract`.
    pub registry: Arc<ExtractorRegistry>,
    /// Client for the release feed.
    pub http: reqwest::Client,
    /// Release feed, when configured.
    pub releases: Option<ReleaseFeed>,
}

impl AppState {
    /// State with the default site registry and no release feed.
    #[must_use]
    pub fn new(store: Arc<dyn NotionStore>) -> Self {
        Self {
            store,
            registry: Arc::new(ExtractorRegistry::with_default_sites()),
            http: reqwest::Client::new(),
            releases: None,
        }
    }

    /// Enables `GET /api/extension/latest`.
    #[must_use]
    pub fn with_releases(mut self, feed: ReleaseFeed) -> Self {
        self.releases = Some(feed);
        self
    }

    /// Builds state from `NOTION_*` and `NOTION_MAP_RELEASES_REPO`.
    ///
    /// # Errors
    ///
    /// Returns [`NotionError`] if the token is missing or the HTTP client
    /// cannot be built.
    pub fn from_env() -> Result<Self, NotionError> {
        let config = NotionConfig::from_env()?;
        let ttl = config.schema_cache_ttl;
        log::info!(
            "Using Notion API at {} (schema cache {}s)",
            config.api_url,
            ttl.as_secs()
        );
        let store = SchemaCache::new(NotionClient::new(config)?, ttl);

        let mut state = Self::new(Arc::new(store));
        if let Some(repo) = std::env::var("NOTION_MAP_RELEASES_REPO")
            .ok()
            .filter(|r| !r.is_empty())
        {
            state = state.with_releases(ReleaseFeed {
                repo,
                api_url: notion_map_releases::DEFAULT_API_URL.to_owned(),
            });
        }
        Ok(state)
    }
}

/// Bind address and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// TCP port.
    pub port: u16,
}

impl ServerConfig {
    /// Reads `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default 8080).
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        Self { bind_addr, port }
    }
}

/// Registers every API route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/databases", web::get().to(handlers::databases))
            .route("/databases/{id}/schema", web::get().to(handlers::schema))
            .route("/databases/{id}/locations", web::get().to(handlers::locations))
            .route(
                "/databases/{id}/locations",
                web::post().to(handlers::create_location),
            )
            .route("/databases/{id}/clusters", web::get().to(handlers::clusters))
            .route("/extract", web::post().to(handlers::extract))
            .route(
                "/extension/latest",
                web::get().to(handlers::extension_latest),
            ),
    );
}

/// Starts the API server.
///
/// This is a regular async function; the caller provides the runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(state: AppState, config: ServerConfig) -> std::io::Result<()> {
    let state = web::Data::new(state);

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .shutdown_timeout(5)
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}

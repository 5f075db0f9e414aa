//! # subtab: Campaign Monitor subscribe forms as Facebook Page tabs
//!
//! `subtab` is a small Facebook canvas app. A page administrator connects
//! their Campaign Monitor account, configures a subscribe form (list choice,
//! custom fields, intro/thank-you copy) for one of their pages, and embeds
//! the form as a page tab. Page visitors then subscribe without leaving
//! Facebook.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer with SQLite (via SQLx) for persistence. There are two
//! outbound dependencies, both plain HTTPS APIs wrapped in small gateways:
//!
//! - **Facebook** ([`facebook`]): the OAuth dialog round trip, Graph reads
//!   for the current user and their pages, and `signed_request` verification
//!   for page-tab context and the deauthorize webhook.
//! - **CreateSend** ([`createsend`]): API-key exchange, clients, lists,
//!   custom-field definitions, and adding subscribers.
//!
//! Both gateways are traits with reqwest implementations, so request
//! handlers are testable against canned vendors.
//!
//! ### Request flow
//!
//! A page admin arrives at `/` inside the Facebook canvas. Without a session
//! they are bounced through the OAuth dialog; the callback stores the uid
//! and Graph token in a signed cookie ([`auth`]). The settings page then
//! links a CreateSend account (`POST /apikey`), browses clients, lists and
//! custom fields through thin JSON read-throughs, and saves one form per
//! page (`POST /page/:page_id`). Visitors hit `GET /tab` inside the page
//! itself and submit to `POST /subscribe/:page_id`, which adds them to the
//! configured list.
//!
//! Vendor failures deliberately collapse to safe fallbacks at the handler
//! layer (empty lists, generic status messages): the embedded UI has no use
//! for vendor error details. The gateways themselves return typed errors.

pub mod api;
pub mod auth;
pub mod config;
pub mod createsend;
pub mod db;
pub mod errors;
pub mod facebook;
mod openapi;
mod static_assets;
pub mod telemetry;
pub mod types;
pub mod views;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Json, Router,
    routing::{get, post},
};
use bon::Builder;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use createsend::CreateSendApi;
use facebook::FacebookApi;
use openapi::ApiDoc;

/// Application state shared across all request handlers.
///
/// Holds the database pool, the immutable configuration loaded at startup,
/// and the two vendor gateways as trait objects (swapped for canned
/// implementations in tests).
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub facebook: Arc<dyn FacebookApi>,
    pub createsend: Arc<dyn CreateSendApi>,
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        // Settings flow
        .route("/", get(api::handlers::settings::show_settings))
        .route("/saved/{page_id}", get(api::handlers::settings::show_saved))
        .route("/apikey", post(api::handlers::settings::exchange_api_key))
        .route("/clients/{api_key}", get(api::handlers::settings::list_clients))
        .route("/lists/{api_key}/{client_id}", get(api::handlers::settings::list_lists))
        .route(
            "/customfields/{api_key}/{list_id}",
            get(api::handlers::settings::list_custom_fields),
        )
        .route("/page/{page_id}", post(api::handlers::settings::save_page))
        // Subscribe flow
        .route("/tab", get(api::handlers::subscribe::show_tab))
        .route("/subscribe/{page_id}", post(api::handlers::subscribe::subscribe))
        // Facebook lifecycle
        .route("/auth/facebook", get(api::handlers::auth::oauth_start))
        .route("/auth/facebook/callback", get(api::handlers::auth::oauth_callback))
        .route("/auth/failure", get(api::handlers::auth::auth_failure))
        .route("/logout", get(api::handlers::auth::logout))
        .route("/ondeauth", get(api::handlers::auth::ondeauth))
        // Informational
        .route("/privacy", get(api::handlers::pages::privacy))
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .with_state(state);

    routes
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(api::handlers::static_assets::serve_embedded_asset)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects the database, runs
///    migrations and wires the vendor gateways
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let connection_string = config.database.connection_string(&config.environment);
        let pool = db::connect(&connection_string).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .facebook(Arc::new(facebook::GraphClient::new(&config.facebook)))
            .createsend(Arc::new(createsend::CreateSendClient::new(&config.createsend)))
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Subscribe form app listening on http://{}", bind_addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

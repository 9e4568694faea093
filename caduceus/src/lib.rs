//! # caduceus: authentication core for a FHIR-flavored healthcare API
//!
//! `caduceus` implements the credential-verification and identity-resolution
//! contract of a healthcare REST backend: HTTP Basic credentials exchanged
//! for signed, expiring, revocable bearer tokens, with role/permission-based
//! authorization resolved once per request.
//!
//! ## Request Flow
//!
//! Every API request passes through the authentication middleware, which
//! inspects the `Authorization` header and runs exactly one verification
//! path: Basic credentials (email + password against the stored Argon2
//! hash) or a Bearer token (signature, expiry, and revocation checks).
//! Basic takes precedence when both are present, and a failure on the
//! selected path aborts the request with a typed 401 — there is no
//! fallback between methods. On success the identity resolver loads the
//! user's role, aggregates the permissions it grants, and attaches the
//! resulting [`auth::identity::Principal`] to the request context.
//! Requests without credentials proceed anonymously; each endpoint decides
//! whether that is acceptable.
//!
//! On the way out, API responses are forced to the canonical FHIR media
//! type, and any session cookie is stripped from responses to requests
//! that authenticated through this pipeline — API calls never establish
//! browser session state.
//!
//! ## Core Components
//!
//! The **API layer** ([`api`]) exposes the token endpoints (`POST /tokens`
//! to exchange Basic credentials for a bearer token, `DELETE /tokens` to
//! revoke) and user-account management (registration, confirmation,
//! principal introspection, password changes).
//!
//! The **authentication layer** ([`auth`]) holds the dispatcher, the
//! password and token primitives, the identity resolver, and the request
//! middleware.
//!
//! The **store layer** ([`store`], [`db`]) abstracts credential lookups
//! behind [`store::CredentialStore`], with a PostgreSQL implementation
//! using the repository pattern. Revocation rotates a per-user token
//! secret; the write is durable before the revocation call returns.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use caduceus::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = caduceus::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     caduceus::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::{password, token},
    db::models::users::UserCreateDBRequest,
    errors::Error,
    openapi::ApiDoc,
    store::{CredentialStore, PgStore},
};

pub use types::{PermissionId, RoleId, UserId};

/// Application state shared across all request handlers.
///
/// Holds the credential store and the loaded configuration. Everything
/// request-scoped lives in the per-request [`auth::middleware::RequestContext`]
/// instead.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub config: Config,
}

/// Get the caduceus database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: when a user already holds the configured admin email the
/// existing id is returned. The admin account is created confirmed and
/// active with the "Super Admin" role, so it can authenticate immediately.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(store: &dyn CredentialStore, config: &Config) -> Result<UserId, Error> {
    let email = config.admin_email.trim().to_uppercase();

    if let Some(existing) = store.find_by_active_email(&email).await? {
        return Ok(existing.id);
    }

    let password_hash = match config.admin_password.as_deref() {
        Some(password) => Some(password::hash_string(password)?),
        None => None,
    };

    let role = store.role_by_name("Super Admin").await?.ok_or_else(|| Error::Integrity {
        detail: "role catalog is not seeded".to_string(),
    })?;

    let created = store
        .create_user(&UserCreateDBRequest {
            first_name: "System".to_string(),
            last_name: "Administrator".to_string(),
            email,
            password_hash,
            confirmed: true,
            active: true,
            role_id: Some(role.id),
            token_secret: token::generate_token_secret(),
        })
        .await?;

    info!("Created initial admin user {}", created.id);
    Ok(created.id)
}

/// Connect to PostgreSQL, run migrations, and seed initial data.
async fn setup_database(config: &Config) -> anyhow::Result<PgStore> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.pool.max_connections)
        .min_connections(config.database.pool.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(config.database.pool.acquire_timeout_secs))
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    let store = PgStore::new(pool);
    store.initialize_catalog().await?;
    create_initial_admin_user(&store, config).await?;

    Ok(store)
}

/// Build the application router: API routes wrapped by the authentication
/// middleware, the health endpoint, and rendered API docs.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/tokens",
            post(api::handlers::tokens::issue_token).delete(api::handlers::tokens::revoke_token),
        )
        .route(
            "/users",
            post(api::handlers::users::register).get(api::handlers::users::list_users),
        )
        .route("/users/confirm", post(api::handlers::users::confirm_account))
        .route("/users/me", get(api::handlers::users::current_principal))
        .route("/users/me/password", put(api::handlers::users::change_password))
        .layer(from_fn_with_state(state.clone(), auth::middleware::authenticate_request))
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, seeds the catalog and admin user, and builds the router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting caduceus with configuration: {:#?}", config);

        let store = setup_database(&config).await?;
        let pool = store.pool().clone();

        let state = AppState {
            store: Arc::new(store),
            config: config.clone(),
        };
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Caduceus listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

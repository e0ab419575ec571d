//! BITSA Backend - library for app logic and testing

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod routes;
pub mod rpc;
pub mod session;
pub mod store;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::AppConfig;
use identity::IdentityResolver;
use rpc::ProcedureRouter;
use session::SessionManager;
use store::{Content, ContentStore, PgContentStore};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub rpc: Arc<ProcedureRouter>,
    pub content: Content,
}

/// Wire the procedure router, identity resolver and content facade around
/// one store handle.
pub fn build_state(config: &AppConfig, store: Arc<dyn ContentStore>) -> AppState {
    let content = Content::new(store.clone());
    let identity = IdentityResolver::new(
        store,
        SessionManager::new(config.session.clone()),
        config.owner_open_id.clone(),
    );
    let rpc = ProcedureRouter::new(content.clone(), identity);
    tracing::debug!(procedures = rpc.names().count(), "procedure router built");

    AppState {
        rpc: Arc::new(rpc),
        content,
    }
}

/// CORS for the configured frontend origins. Credentials are allowed so
/// the session cookie travels with RPC calls.
pub fn configure_cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    let cors = configure_cors(&config.allowed_origins);
    tracing::info!(origins = ?config.allowed_origins, "CORS configured");

    Router::new()
        .route(
            "/api/rpc/{name}",
            get(routes::rpc::call_query).post(routes::rpc::call_mutation),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Open the Postgres store, or a disconnected one when no database is
/// configured or reachable. The site then serves empty content.
async fn open_store() -> PgContentStore {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
        return PgContentStore::disconnected();
    }

    match db::init_pool(None).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!(error = %e, "failed to run database migrations");
            }
            PgContentStore::new(pool)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to initialize database pool, continuing without database");
            PgContentStore::disconnected()
        }
    }
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env();

    // Dropping the guards stops the background writers.
    let _log_guards = logging::init(&config.environment);

    routes::health::init_start_time();

    if let Err(reason) = config.check_production_secrets() {
        panic!("FATAL: {} Refusing to start.", reason);
    }
    if config.owner_open_id.is_none() {
        tracing::warn!("OWNER_OPEN_ID is not set; no account will be promoted to admin on login");
    }

    let store = open_store().await;
    let state = build_state(&config, Arc::new(store));
    let app = create_app(state, &config);

    let addr = config
        .bind_addr()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!(%addr, environment = %config.environment, "starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

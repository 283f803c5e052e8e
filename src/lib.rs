//! RefactorIQ - authentication backend with GitHub OAuth and admin login
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /api/v1/auth: admin login, GitHub OAuth, session          │
//! │  - /api/v1/users: permission-gated user directory            │
//! │  - /health, /metrics                                         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Auth + Service Layer                         │
//! │  - JWT sessions, Argon2 passwords, AES-GCM token storage     │
//! │  - Identity resolution, permission checks                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx)                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers, response envelope and metrics endpoint
//! - `auth`: Tokens, credentials, GitHub OAuth, access control
//! - `service`: User directory business logic
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

use serde::Serialize;

/// Largest accepted request body; every JSON payload here is tiny
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers
///
/// This struct is cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Login flows and session validation
    pub auth: auth::AuthService,

    /// User directory
    pub users: service::UserService,

    /// GitHub OAuth client
    pub oauth: auth::GitHubOAuth,

    /// Encrypts GitHub access tokens before they are stored
    pub cipher: auth::TokenCipher,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database (runs migrations)
    /// 2. Build credential primitives and the token service
    /// 3. Initialize HTTP client for GitHub
    /// 4. Wire services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        tracing::info!(path = %config.database.path.display(), "Database connected");

        // 2. Credentials and tokens
        let passwords = auth::PasswordHasher::new(&config.auth.password_hash)?;
        let tokens = auth::TokenService::from_config(&config.auth)?;
        let cipher = auth::TokenCipher::from_base64_key(&config.auth.encryption_key)?;

        // 3. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("RefactorIQ/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;
        let oauth = auth::GitHubOAuth::new(http_client, config.github.clone());

        // 4. Services
        let auth = auth::AuthService::new(db.clone(), tokens, passwords.clone());
        let users = service::UserService::new(db.clone(), passwords);

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            auth,
            users,
            oauth,
            cipher,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower::ServiceBuilder;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer,
        map_response_body::MapResponseBodyLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    let api_v1 = Router::new()
        .merge(auth::auth_router(state.clone()))
        .merge(api::users_router(state.clone()));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_v1)
        .route_layer(middleware::from_fn(api::track_requests))
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer)
                .layer(MapResponseBodyLayer::new(axum::body::Body::new))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES)),
        )
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::{HeaderValue, Method, header};
    use tower_http::cors::CorsLayer;

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter(|origin| origin.trim() != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::error!(%error, %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    version: String,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> api::ApiResponse<HealthStatus> {
    api::ApiResponse::success(HealthStatus {
        status: "healthy",
        version: state.config.app.version.clone(),
    })
}

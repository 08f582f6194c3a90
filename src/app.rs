use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::Key;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{password, AuthProvider, MemorySessionStore, PgSessionStore, SessionStore};
use crate::config::AppConfig;
use crate::database::models::NewUser;
use crate::database::{
    BrainDumpRepository, DatabaseManager, MemoryBrainDumpRepository, MemoryUserRepository,
    PgBrainDumpRepository, PgUserRepository, RepositoryError, UserRepository,
};
use crate::handlers;
use crate::middleware::require_auth;

/// Shared per-request state. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub brain_dumps: Arc<dyn BrainDumpRepository>,
    cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
        brain_dumps: Arc<dyn BrainDumpRepository>,
    ) -> Self {
        // derive_from needs at least 32 bytes; AppConfig validation enforces it
        let cookie_key = Key::derive_from(config.security.session_secret.expose().as_bytes());
        Self {
            config: Arc::new(config),
            users,
            sessions,
            brain_dumps,
            cookie_key,
        }
    }

    /// State backed by the PostgreSQL pool
    pub fn postgres(config: AppConfig, database: &DatabaseManager) -> Self {
        let pool = database.pool().clone();
        Self::new(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool.clone())),
            Arc::new(PgBrainDumpRepository::new(pool)),
        )
    }

    /// State backed by process memory; nothing survives a restart
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryBrainDumpRepository::new()),
        )
    }

    /// One-time startup work: drop sessions that expired while the server
    /// was down and seed the fixed test user when that provider is configured.
    pub async fn prepare(&self) -> Result<(), RepositoryError> {
        let purged = self.sessions.purge_expired().await?;
        if purged > 0 {
            tracing::info!("Purged {} expired sessions", purged);
        }

        if let AuthProvider::FixedTestUser { username } = &self.config.auth.provider {
            tracing::warn!("Auth provider is FixedTestUser: every request acts as '{}'", username);
            if self.users.find_by_username(username).await?.is_none() {
                self.seed_test_user(username).await?;
            }
        }
        Ok(())
    }

    async fn seed_test_user(&self, username: &str) -> Result<(), RepositoryError> {
        // The seeded user has no usable password; it is reachable only through the provider
        let unusable = password::generate_unusable_hash();
        match self
            .users
            .create(NewUser {
                username: username.to_string(),
                password_hash: unusable,
                display_name: "Test User".to_string(),
            })
            .await
        {
            Ok(user) => {
                tracing::info!("Seeded fixed test user '{}' ({})", user.username, user.id);
                Ok(())
            }
            // Another instance won the race
            Err(RepositoryError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/api/register", post(auth::register_post))
        .route("/api/login", post(auth::login_post))
        .route("/api/logout", post(auth::logout_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use handlers::protected::{brain_dumps, user};

    Router::new()
        .route("/api/user", get(user::user_get))
        .route("/api/user/password", put(user::password_put))
        .route("/api/brain-dumps", get(brain_dumps::list).post(brain_dumps::create))
        .route(
            "/api/brain-dumps/:id",
            get(brain_dumps::show)
                .put(brain_dumps::update)
                .delete(brain_dumps::delete),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.users.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "message": "database unavailable"
                })),
            )
        }
    }
}

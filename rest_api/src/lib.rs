// rest_api/src/lib.rs
//! HTTP surface of the records portal.

use anyhow::{Context, Error as AnyhowError};
use axum::{
    extract::rejection::JsonRejection,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use lib::Database;
use models::PortalError;
use security::{require_bearer, AuthError, JwtKeys, RolesConfig};

pub mod config;
mod handlers;

pub use crate::config::PortalConfig;

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] AnyhowError),
}

impl From<JsonRejection> for RestApiError {
    fn from(rejection: JsonRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RestApiError::Auth(e) => return e.into_response(),
            RestApiError::Portal(e) => match e {
                PortalError::Validation(_) | PortalError::Conflict(_) | PortalError::InvalidState(_) => {
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                PortalError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, e.to_string()),
                PortalError::Forbidden(_) => (StatusCode::FORBIDDEN, e.to_string()),
                PortalError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                other => {
                    error!("request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
                }
            },
            RestApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            RestApiError::Anyhow(e) => {
                error!("request failed: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub roles: Arc<RolesConfig>,
    pub keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(db: Database, roles: RolesConfig, keys: JwtKeys) -> Self {
        AppState { db: Arc::new(db), roles: Arc::new(roles), keys: Arc::new(keys) }
    }

    /// Opens storage and builds keys and policy from `config`.
    pub fn from_config(config: &PortalConfig) -> Result<Self, AnyhowError> {
        let keys = config.jwt_keys()?;
        let roles = config.roles()?;
        let db = Database::open(&config.storage_config()).context("Failed to open portal storage")?;
        Ok(AppState::new(db, roles, keys))
    }
}

/// Every route of the API. Everything except login, health and the public
/// patient card sits behind the bearer-token layer.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/admin/facilities/register", post(handlers::register_facility))
        .route("/api/admin/facilities", get(handlers::list_facilities))
        .route("/api/admin/users", get(handlers::list_users))
        .route("/api/admin/facility/:id", delete(handlers::delete_facility))
        .route("/api/facility/:id", get(handlers::get_facility))
        .route("/api/facility/staff/by-facility/:facility_id", get(handlers::list_staff))
        .route("/api/facility/staff/register", post(handlers::register_staff))
        .route("/api/facility/staff/:id", delete(handlers::delete_staff))
        .route("/api/patients/register", post(handlers::register_patient))
        .route("/api/patients", get(handlers::search_patients))
        .route("/api/patients/:id", get(handlers::get_patient).put(handlers::update_patient))
        .route("/api/patients/:id/medications/:med_name/dispense", put(handlers::dispense_medication))
        .route_layer(middleware::from_fn_with_state(state.keys.clone(), require_bearer));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/patients/:id/public", get(handlers::public_patient))
        .merge(protected)
        .with_state(state)
}

/// CORS for the browser front-end. No configured origins means any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, AnyhowError> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    if origins.is_empty() {
        return Ok(cors.allow_origin(Any));
    }
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin '{}'", o)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

/// Serves the API until `shutdown` resolves, then flushes storage.
pub async fn start_server<F>(config: PortalConfig, shutdown: F) -> Result<(), AnyhowError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(&config)?;
    let db = state.db.clone();
    let app = router(state)
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;
    info!("Portal API listening on {} ({} storage)", addr, config.storage_engine_type);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("Portal API server failed")?;

    db.flush().await.context("Failed to flush storage on shutdown")?;
    info!("Portal API stopped.");
    Ok(())
}

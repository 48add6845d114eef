// security/src/lib.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use models::medical::{Role, User};
use models::PortalError;

pub mod middleware;
pub mod roles;

pub use middleware::{require_bearer, CurrentUser};
pub use roles::{Permission, RolesConfig};

/// Shortest HMAC secret the server accepts.
pub const MIN_SECRET_LEN: usize = 32;

/// Default token lifetime: one day.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Claims carried by a portal bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid, // Subject (user id)
    pub role: Role,
    pub facility_id: Option<Uuid>,
    pub iat: u64, // Issued at
    pub exp: u64, // Expiration time
}

impl Claims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }
}

/// Authentication and authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized: No token provided")]
    MissingToken,
    #[error("Unauthorized: Invalid token")]
    InvalidToken(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("JWT error: {0}")]
    Jwt(String),
    #[error("JWT secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    WeakSecret(usize),
}

impl From<AuthError> for PortalError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) => PortalError::Unauthorized(err.to_string()),
            AuthError::Forbidden(msg) => PortalError::Forbidden(msg),
            AuthError::Jwt(_) | AuthError::WeakSecret(_) => PortalError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Jwt(_) | AuthError::WeakSecret(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            AuthError::Jwt(_) | AuthError::WeakSecret(_) => {
                tracing::error!("token handling failed: {}", self);
                "Server error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "status": "error", "message": message }))).into_response()
    }
}

/// HMAC key pair plus token lifetime. Built once at startup and shared.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtKeys {
    /// Refuses short secrets; there is no built-in fallback secret.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret(secret.len()));
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Ok(JwtKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user.id,
            role: user.role,
            facility_id: user.facility_id,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Jwt(format!("Failed to encode JWT: {}", e)))
    }

    /// Decodes and validates a token: signature, algorithm and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

fn now_secs() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AuthError::Jwt(format!("System time error: {}", e)))
}

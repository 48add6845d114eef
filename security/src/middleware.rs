// security/src/middleware.rs
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::{AuthError, Claims, JwtKeys};

/// Rejects requests without a valid `Authorization: Bearer` token and
/// attaches the decoded claims to the request for downstream handlers.
///
/// Role checks are not done here; handlers consult [`crate::RolesConfig`]
/// with the permission their route declares.
pub async fn require_bearer(
    State(keys): State<Arc<JwtKeys>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let claims = keys.validate(token).map_err(|e| {
        tracing::warn!(path = %req.uri().path(), "rejected bearer token: {}", e);
        e
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// The claims attached by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::MissingToken)
    }
}

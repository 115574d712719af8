use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use super::{jwt::JwtKeys, services::token_from_cookie_header};
use crate::error::AppError;

/// Session token from the `token` cookie, else from `Authorization: Bearer`.
fn session_token(parts: &Parts) -> Option<&str> {
    let from_cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(token_from_cookie_header);
    from_cookie.or_else(|| {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

/// Authenticated user id; rejects with 401.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized: No token provided".into()))?;
        let claims = JwtKeys::from_ref(state).verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Unauthorized: Invalid token".into())
        })?;
        Ok(AuthUser(claims.sub))
    }
}

/// Like [`AuthUser`] but yields `None` instead of rejecting.
pub struct MaybeAuthUser(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user_id = session_token(parts)
            .and_then(|t| JwtKeys::from_ref(state).verify(t).ok())
            .map(|c| c.sub);
        Ok(MaybeAuthUser(user_id))
    }
}

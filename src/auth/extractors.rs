use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{
        jwt::JwtKeys,
        repo_types::{Role, User},
    },
    error::AuthError,
    state::AppState,
};

pub const SESSION_COOKIE_NAME: &str = "token";

/// Bearer header first, then the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| {
            auth.strip_prefix("Bearer ")
                .or_else(|| auth.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, val) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.trim().to_string())
    })
}

/// Authenticated user id, resolved from the session token alone.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let claims = JwtKeys::from_ref(state).verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            AuthError::Unauthenticated
        })?;
        Ok(AuthUser(claims.sub))
    }
}

/// Authenticated and still-active user record.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        match state.store.find_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(CurrentUser(user)),
            _ => {
                warn!(%user_id, "token subject missing or deactivated");
                Err(AuthError::Unauthenticated)
            }
        }
    }
}

/// Authenticated user holding the admin role. Authentication always runs first.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        authorize(&user, Role::Admin)?;
        Ok(AdminUser(user))
    }
}

pub fn authorize(user: &User, required: Role) -> Result<(), AuthError> {
    if user.role.satisfies(required) {
        Ok(())
    } else {
        warn!(user_id = %user.id, required = ?required, "forbidden");
        Err(AuthError::Forbidden)
    }
}

/// The owner of `target` or an admin.
pub fn authorize_owner_or_admin(user: &User, target: Uuid) -> Result<(), AuthError> {
    if user.id == target {
        return Ok(());
    }
    authorize(user, Role::Admin)
}

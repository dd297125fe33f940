use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use crate::auth::{jwt::JwtKeys, repo_types::User};
use crate::db::AppState;
use crate::error::ApiError;

/// The single verification routine behind both the extractor and the
/// explicit auth-check handler: extract the bearer token, verify its
/// signature and expiry, then re-resolve the subject against the live
/// store. The re-lookup is mandatory, not defensive: tokens are not
/// invalidated when a user is deleted, so the gate fails closed here.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::NoCredential)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::NoCredential)?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|kind| {
        warn!(kind = %kind, "token verification failed");
        ApiError::InvalidToken(kind)
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::UnknownSubject)?;

    Ok(user)
}

/// Request guard for protected routes. Handlers taking `CurrentUser` only
/// run once the gate has attached a live user record; every failure is a
/// 401 before the handler body executes.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(state, &parts.headers).await?;
        Ok(CurrentUser(user))
    }
}

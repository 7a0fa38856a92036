//! Authentication extractors.
//!
//! Handlers name the caller they need in their signature: `RequireUser` for
//! any authenticated caller, `RequireAdmin` for admin-only operations.
//! Rejections are `AppError`s, so they share the JSON error body.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::{AuthError, TokenService};
use crate::state::AppState;

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_cart(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Hello, user {}!", user.id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub CurrentUser);

/// Extractor that requires a valid bearer token with the admin role.
///
/// Missing or invalid tokens are rejected with 401, valid non-admin tokens
/// with 403.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub CurrentUser);

fn identify(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let token = TokenService::token_from_header(header)?;
    let user = state.tokens().verify(token)?;
    set_sentry_user(&user.id);
    Ok(user)
}

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(identify(parts, state)?))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = identify(parts, state)?;
        if !user.is_admin() {
            tracing::debug!(user_id = %user.id, "Admin route refused");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(user))
    }
}

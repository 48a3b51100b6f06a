use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::TokenKind, jwt::JwtKeys};
use crate::{error::ApiError, state::AppState, users::{repo_types::User, services::load_user}};

pub const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// Raw token from an `Authorization: Bearer <token>` header.
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Invalid authentication scheme"))?;

        Ok(BearerToken(token.to_string()))
    }
}

/// The user behind a valid access token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let claims = JwtKeys::from_ref(state)
            .verify(&token, TokenKind::Access)
            .map_err(|e| {
                warn!(error = %e, "invalid access token");
                ApiError::unauthorized(CREDENTIALS_ERROR)
            })?;

        let user = load_user(state, &claims.sub).await?.ok_or_else(|| {
            warn!(email = %claims.sub, "token for unknown user");
            ApiError::unauthorized(CREDENTIALS_ERROR)
        })?;

        Ok(CurrentUser(user))
    }
}

//! Auth gate extractors
//!
//! `AuthUser` requires a valid bearer token. `AdminUser` additionally loads
//! the account and requires its admin flag; a missing account or a false
//! flag is denied.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use emotune_common::api::AuthError;
use emotune_common::db;
use emotune_common::models::UserAccount;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Identity from a validated bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The token's `sub` claim
    pub user_id: String,
}

/// An authenticated user whose account carries the admin flag
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: UserAccount,
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingToken),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(&parts.headers)
            .and_then(|token| state.tokens.validate(token))
            .map_err(|e| {
                warn!("Rejected {} {}: {}", parts.method, parts.uri.path(), e);
                ApiError::from(e)
            })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser { user_id } = AuthUser::from_request_parts(parts, state).await?;

        match db::find_user_by_id(&state.db, &user_id).await? {
            Some(user) if user.is_admin => Ok(AdminUser { user }),
            _ => {
                warn!("Denied admin route {} to user {}", parts.uri.path(), user_id);
                Err(ApiError::Forbidden("Unauthorized".to_string()))
            }
        }
    }
}

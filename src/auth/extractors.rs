use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::{
    claims::TokenKind,
    cookies::{bearer_token, read_cookie, ACCESS_COOKIE},
    repo_types::PublicUser,
};
use crate::{error::AppError, state::AppState};

/// Verifies the access token (cookie first, then bearer header) and loads
/// the current user from the store.
pub struct AuthUser(pub PublicUser);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_cookie(&parts.headers, ACCESS_COOKIE)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or_else(|| {
                warn!("missing access token");
                AppError::Unauthorized("unauthorized request".into())
            })?;

        let user_id = state
            .signer
            .verify(&token, TokenKind::Access)
            .map_err(|e| {
                warn!(reason = %e, "access token rejected");
                AppError::Unauthorized("invalid access token".into())
            })?;

        let user = state.issuer.current_user(user_id).await?;
        Ok(AuthUser(user))
    }
}

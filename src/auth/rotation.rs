//! Refresh-token rotation.
//!
//! A presented refresh token walks these states:
//!
//! ```text
//! Absent ─────────────────────────────────────────────▶ reject
//! Presented ─ verify ─▶ SignatureInvalid | Expired ───▶ reject
//!                    └▶ SignatureValid ─ find_by_id ─▶ IdentityMissing ▶ reject
//!                                                   └▶ IdentityFound
//! IdentityFound ─ compare with stored ─▶ mismatch ────▶ Reused (reject)
//!                                    └▶ match ─ mint ─ swap ─▶ Accepted
//!                                                         └▶ lost race ▶ Reused
//! ```
//!
//! The conditional swap is the commit point: until it lands nothing
//! observable has changed, and once it lands the old token is dead even
//! though its signature is still valid.

use thiserror::Error;
use tracing::debug;

use super::{
    claims::TokenKind,
    dto::TokenPair,
    jwt::{TokenError, TokenSigner},
    repo::CredentialStore,
    repo_types::{StoreError, User},
};

/// Terminal rejections. All of them surface to clients as one generic
/// `Unauthorized`; the distinction only reaches the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RotationRejection {
    #[error("no refresh token presented")]
    Absent,

    #[error("refresh token signature invalid")]
    SignatureInvalid,

    #[error("refresh token expired")]
    Expired,

    #[error("refresh token subject no longer exists")]
    IdentityMissing,

    #[error("refresh token reused or revoked")]
    Reused,
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Rejected(#[from] RotationRejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("minting rotated token pair failed: {0}")]
    Signing(#[source] TokenError),
}

/// An accepted rotation: the user as stored after the swap and the new pair.
#[derive(Debug)]
pub struct Rotated {
    pub user: User,
    pub tokens: TokenPair,
}

pub async fn rotate(
    store: &dyn CredentialStore,
    signer: &TokenSigner,
    presented: Option<&str>,
) -> Result<Rotated, RotationError> {
    let presented = match presented.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => return Err(RotationRejection::Absent.into()),
    };

    let user_id = signer
        .verify(presented, TokenKind::Refresh)
        .map_err(|e| match e {
            TokenError::Expired => RotationRejection::Expired,
            _ => RotationRejection::SignatureInvalid,
        })?;
    debug!(user_id = %user_id, "refresh token signature valid");

    let mut user = store
        .find_by_id(user_id)
        .await?
        .ok_or(RotationRejection::IdentityMissing)?;

    if user.refresh_token.as_deref() != Some(presented) {
        return Err(RotationRejection::Reused.into());
    }

    let tokens = signer.mint_pair(user.id).map_err(RotationError::Signing)?;
    let swapped = store
        .swap_refresh_token(user.id, presented, Some(&tokens.refresh_token))
        .await?;
    if !swapped {
        // a concurrent refresh with the same token committed first
        return Err(RotationRejection::Reused.into());
    }

    user.refresh_token = Some(tokens.refresh_token.clone());
    debug!(user_id = %user.id, "refresh token rotated");
    Ok(Rotated { user, tokens })
}

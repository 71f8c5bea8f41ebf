use serde::{Deserialize, Serialize};

use crate::{auth::repo_types::PublicUser, media::UploadItem};

/// Freshly minted access + refresh tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration fields as they arrive from the form. Everything is optional
/// here; presence is checked by the issuer before anything is read.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<UploadItem>,
    pub cover_image: Option<UploadItem>,
}

/// Request body for login. Either `username` or `email` identifies the user.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body fallback for token refresh when the cookie is not available.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// Result of a successful login or refresh.
#[derive(Debug)]
pub struct LoginOutput {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

/// Body returned after login or refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<LoginOutput> for AuthResponse {
    fn from(out: LoginOutput) -> Self {
        Self {
            user: out.user,
            access_token: out.tokens.access_token,
            refresh_token: out.tokens.refresh_token,
        }
    }
}

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginOutput, LoginRequest, RegisterInput},
        jwt::TokenSigner,
        password::PasswordService,
        repo::CredentialStore,
        repo_types::{NewUser, PublicUser},
        rotation::{self, RotationError, Rotated},
    },
    error::AppError,
    media::MediaUploader,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed value when present and non-blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    non_blank(value).ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

/// Passwords are checked for blankness but used exactly as given.
fn required_password(value: Option<&str>) -> Result<&str, AppError> {
    value
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Validation("password is required".into()))
}

/// Orchestrates registration, login, logout and refresh. The refresh token
/// written here is the only authoritative copy; clients hold advisory ones.
pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    signer: Arc<TokenSigner>,
    passwords: Arc<dyn PasswordService>,
    media: Arc<dyn MediaUploader>,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        signer: Arc<TokenSigner>,
        passwords: Arc<dyn PasswordService>,
        media: Arc<dyn MediaUploader>,
    ) -> Self {
        Self {
            store,
            signer,
            passwords,
            media,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<PublicUser, AppError> {
        let username = required(input.username.as_deref(), "username")?.to_lowercase();
        let email = required(input.email.as_deref(), "email")?.to_lowercase();
        let full_name = required(input.full_name.as_deref(), "fullName")?.to_string();
        let password = required_password(input.password.as_deref())?;

        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::Validation("invalid email".into()));
        }

        if self
            .store
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?
            .is_some()
        {
            warn!(username = %username, email = %email, "identity already registered");
            return Err(AppError::Conflict(
                "user already exists with this username or email".into(),
            ));
        }

        let avatar = input
            .avatar
            .ok_or_else(|| AppError::Validation("avatar file is required".into()))?;
        let avatar = self.media.upload(avatar).await.ok_or_else(|| {
            AppError::upstream(
                "error uploading avatar",
                anyhow::anyhow!("media host returned no url"),
            )
        })?;
        let cover_image = match input.cover_image {
            Some(item) => self.media.upload(item).await.unwrap_or_else(|| {
                warn!("cover image upload failed; continuing without it");
                String::new()
            }),
            None => String::new(),
        };

        let password_hash = self
            .passwords
            .hash_password(password)
            .map_err(|e| AppError::upstream("password hashing failed", e))?;

        let user = self
            .store
            .create(NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar,
                cover_image,
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(PublicUser::from(&user))
    }

    #[instrument(skip(self, input))]
    pub async fn login(&self, input: LoginRequest) -> Result<LoginOutput, AppError> {
        let username = non_blank(input.username.as_deref()).map(str::to_lowercase);
        let email = non_blank(input.email.as_deref()).map(str::to_lowercase);
        if username.is_none() && email.is_none() {
            return Err(AppError::Validation("username or email is required".into()));
        }
        let password = required_password(input.password.as_deref())?;

        let user = self
            .store
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| {
                warn!(username = ?username, email = ?email, "login unknown identity");
                AppError::NotFound("user does not exist".into())
            })?;

        let ok = self
            .passwords
            .verify_password(password, &user.password_hash)
            .map_err(|e| AppError::upstream("password verification failed", e))?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self
            .signer
            .mint_pair(user.id)
            .map_err(|e| AppError::upstream("token signing failed", e))?;
        self.store
            .update_refresh_token(user.id, Some(&tokens.refresh_token))
            .await?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutput {
            user: PublicUser::from(&user),
            tokens,
        })
    }

    /// Clears the stored refresh token. Safe to repeat.
    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.store.update_refresh_token(user_id, None).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    #[instrument(skip(self, presented))]
    pub async fn refresh(&self, presented: Option<&str>) -> Result<LoginOutput, AppError> {
        match rotation::rotate(self.store.as_ref(), &self.signer, presented).await {
            Ok(Rotated { user, tokens }) => {
                info!(user_id = %user.id, "session refreshed");
                Ok(LoginOutput {
                    user: PublicUser::from(&user),
                    tokens,
                })
            }
            Err(RotationError::Rejected(reason)) => {
                warn!(%reason, "refresh token rejected");
                Err(AppError::Unauthorized(
                    "invalid or expired refresh token".into(),
                ))
            }
            Err(RotationError::Store(e)) => Err(e.into()),
            Err(RotationError::Signing(e)) => Err(AppError::upstream("token signing failed", e)),
        }
    }

    /// Re-reads the user behind a verified access token.
    #[instrument(skip(self))]
    pub async fn current_user(&self, user_id: Uuid) -> Result<PublicUser, AppError> {
        match self.store.find_by_id(user_id).await? {
            Some(user) => Ok(PublicUser::from(&user)),
            None => {
                warn!(user_id = %user_id, "access token subject no longer exists");
                Err(AppError::Unauthorized("invalid access token".into()))
            }
        }
    }
}

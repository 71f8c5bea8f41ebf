use std::{sync::Arc, time::Duration};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::Duration as TimeDuration;
use tracing::debug;
use uuid::Uuid;

use super::{
    claims::{Claims, TokenKind},
    clock::Clock,
    dto::TokenPair,
};
use crate::config::JwtConfig;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("expected a {expected:?} token")]
    WrongKind { expected: TokenKind },

    #[error("token signing failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    #[error("token lifetime out of range")]
    LifetimeOutOfRange,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn from_secret(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }
}

/// Mints and verifies access and refresh JWTs. Each kind is signed with its
/// own secret, so one leaked secret cannot forge the other kind.
pub struct TokenSigner {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    audience: String,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            access: KeyPair::from_secret(&config.access_secret, config.access_ttl),
            refresh: KeyPair::from_secret(&config.refresh_secret, config.refresh_ttl),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }

    pub fn mint(&self, user_id: Uuid, kind: TokenKind) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let now = self.clock.now();
        let exp = i64::try_from(keys.ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or(TokenError::LifetimeOutOfRange)?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(TokenError::Encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn mint_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.mint(user_id, TokenKind::Access)?,
            refresh_token: self.mint(user_id, TokenKind::Refresh)?,
        })
    }

    /// Checks signature, issuer, audience, kind and expiry. Never consults the
    /// credential store.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        // expiry is judged against the injected clock below
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map_err(classify)?;
        let claims = data.claims;

        if claims.kind != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }
        if self.clock.now().unix_timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        debug!(user_id = %claims.sub, kind = ?kind, "jwt verified");
        Ok(claims.sub)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::ImmatureSignature => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

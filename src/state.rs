use crate::auth::{
    clock::{Clock, SystemClock},
    jwt::TokenSigner,
    memory::MemoryCredentialStore,
    password::{Argon2Passwords, PasswordService},
    repo::{CredentialStore, PgCredentialStore},
    services::SessionIssuer,
};
use crate::config::AppConfig;
use crate::media::{DisabledMediaUploader, MediaUploader, StorageMediaUploader};
use crate::storage::{Storage, StorageClient};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub signer: Arc<TokenSigner>,
    pub issuer: Arc<SessionIssuer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn CredentialStore> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .acquire_timeout(config.store_timeout)
                    .connect(url)
                    .await
                    .context("connect to postgres")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                Arc::new(PgCredentialStore::new(db, config.store_timeout))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory only");
                Arc::new(MemoryCredentialStore::default())
            }
        };

        let media: Arc<dyn MediaUploader> = match &config.media {
            Some(media) => {
                let storage = Storage::new(media)
                    .await
                    .context("init media storage")?;
                let storage = Arc::new(storage) as Arc<dyn StorageClient>;
                Arc::new(StorageMediaUploader::new(storage, media.upload_timeout))
            }
            None => {
                tracing::warn!("MEDIA_ENDPOINT not set; registration uploads will fail");
                Arc::new(DisabledMediaUploader)
            }
        };

        Ok(Self::from_parts(
            config,
            store,
            Arc::new(Argon2Passwords),
            media,
            Arc::new(SystemClock),
        ))
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        passwords: Arc<dyn PasswordService>,
        media: Arc<dyn MediaUploader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(&config.jwt, clock));
        let issuer = Arc::new(SessionIssuer::new(store, signer.clone(), passwords, media));
        Self {
            config: Arc::new(config),
            signer,
            issuer,
        }
    }

    /// In-memory store, fake media host and a fixed clock.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::testing;

        Self::from_parts(
            testing::app_config(),
            Arc::new(MemoryCredentialStore::default()),
            Arc::new(Argon2Passwords),
            Arc::new(testing::FakeUploader::default()),
            testing::fixed_clock(),
        )
    }
}

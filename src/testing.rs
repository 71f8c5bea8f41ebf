//! Fixtures shared by unit tests.

use std::{sync::Arc, sync::Mutex, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use time::macros::datetime;

use crate::{
    auth::{clock::FixedClock, dto::RegisterInput},
    config::{AppConfig, JwtConfig},
    media::{MediaUploader, UploadItem},
};

pub const PASSWORD: &str = "correct-horse-battery-staple";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        access_secret: "access-test-secret".into(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_secret: "refresh-test-secret".into(),
        refresh_ttl: Duration::from_secs(10 * 24 * 60 * 60),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
    }
}

pub fn app_config() -> AppConfig {
    AppConfig {
        database_url: None,
        store_timeout: Duration::from_secs(5),
        jwt: jwt_config(),
        media: None,
        upload_max_bytes: 1024 * 1024,
    }
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(datetime!(2024-01-01 12:00 UTC)))
}

pub fn image(file_name: &str) -> UploadItem {
    UploadItem {
        body: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        content_type: "image/png".into(),
        file_name: Some(file_name.into()),
    }
}

pub fn register_input(username: &str, email: &str) -> RegisterInput {
    RegisterInput {
        username: Some(username.into()),
        email: Some(email.into()),
        full_name: Some("Test Person".into()),
        password: Some(PASSWORD.into()),
        avatar: Some(image("avatar.png")),
        cover_image: None,
    }
}

/// In-memory media host. Uploads whose file name matches `fail_for` fail.
#[derive(Default)]
pub struct FakeUploader {
    fail_for: Option<String>,
    uploaded: Mutex<Vec<String>>,
}

impl FakeUploader {
    pub fn failing_for(file_name: &str) -> Self {
        Self {
            fail_for: Some(file_name.into()),
            ..Default::default()
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(&self, item: UploadItem) -> Option<String> {
        if item.file_name.is_some() && item.file_name == self.fail_for {
            return None;
        }
        let mut uploaded = self.uploaded.lock().unwrap();
        let url = format!("https://media.test/{}", uploaded.len());
        uploaded.push(url.clone());
        Some(url)
    }
}

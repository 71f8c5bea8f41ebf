use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

/// One uploaded file held in memory.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// External media host. `None` means the upload failed; callers decide
/// whether that is fatal.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, item: UploadItem) -> Option<String>;
}

/// Uploads into the configured bucket and hands back the public URL.
pub struct StorageMediaUploader {
    storage: Arc<dyn StorageClient>,
    timeout: Duration,
}

impl StorageMediaUploader {
    pub fn new(storage: Arc<dyn StorageClient>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }
}

#[async_trait]
impl MediaUploader for StorageMediaUploader {
    async fn upload(&self, item: UploadItem) -> Option<String> {
        let ext = ext_from_mime(&item.content_type)
            .or_else(|| item.file_name.as_deref().and_then(ext_from_file_name))
            .unwrap_or("bin");
        let key = format!("users/{}.{}", Uuid::new_v4(), ext);
        let size = item.body.len();

        let put = self.storage.put_object(&key, item.body, &item.content_type);
        match tokio::time::timeout(self.timeout, put).await {
            Ok(Ok(())) => {
                debug!(%key, size, "media uploaded");
                Some(self.storage.public_url(&key))
            }
            Ok(Err(e)) => {
                error!(error = ?e, %key, "media upload failed");
                None
            }
            Err(_) => {
                error!(%key, timeout = ?self.timeout, "media upload timed out");
                None
            }
        }
    }
}

/// Used when no media host is configured; every upload fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMediaUploader;

#[async_trait]
impl MediaUploader for DisabledMediaUploader {
    async fn upload(&self, _item: UploadItem) -> Option<String> {
        warn!("media upload requested but no media host is configured");
        None
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn ext_from_file_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStorage {
        keys: Mutex<Vec<String>>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(&self, key: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                anyhow::bail!("bucket unreachable");
            }
            self.keys.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://media.test/{}", key)
        }
    }

    fn png() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
            file_name: Some("avatar.png".into()),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_file_name("me.JPEG"), Some("jpg"));
        assert_eq!(ext_from_file_name("noext"), None);
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let storage = Arc::new(RecordingStorage::default());
        let uploader = StorageMediaUploader::new(storage.clone(), Duration::from_secs(5));

        let url = uploader.upload(png()).await.expect("upload succeeds");
        let keys = storage.keys.lock().unwrap().clone();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("users/") && keys[0].ends_with(".png"));
        assert_eq!(url, format!("https://media.test/{}", keys[0]));
    }

    #[tokio::test]
    async fn storage_failure_yields_none() {
        let storage = Arc::new(RecordingStorage {
            fail: true,
            ..Default::default()
        });
        let uploader = StorageMediaUploader::new(storage, Duration::from_secs(5));
        assert!(uploader.upload(png()).await.is_none());
    }

    #[tokio::test]
    async fn slow_storage_times_out() {
        let storage = Arc::new(RecordingStorage {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let uploader = StorageMediaUploader::new(storage, Duration::from_millis(20));
        assert!(uploader.upload(png()).await.is_none());
    }

    #[tokio::test]
    async fn disabled_uploader_always_fails() {
        assert!(DisabledMediaUploader.upload(png()).await.is_none());
    }
}

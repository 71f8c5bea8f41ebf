mod services;

pub use services::{DisabledMediaUploader, MediaUploader, StorageMediaUploader, UploadItem};

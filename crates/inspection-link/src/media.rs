//! Access to the camera's media store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocation {
    #[default]
    InternalStorage,
    SdCard,
}

impl StorageLocation {
    pub fn alternate(self) -> Self {
        match self {
            StorageLocation::InternalStorage => StorageLocation::SdCard,
            StorageLocation::SdCard => StorageLocation::InternalStorage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Jpeg,
    RawDng,
    Mov,
    Mp4,
    Other,
}

impl MediaType {
    pub fn is_photo(self) -> bool {
        matches!(self, MediaType::Jpeg | MediaType::RawDng)
    }
}

/// Entry of the media store file index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFileRef {
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub media_type: MediaType,
    #[serde(default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoContent {
    Thumbnail,
    Preview,
}

/// Image data downloaded from the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub content: PhotoContent,
    pub bytes: Vec<u8>,
}

/// Camera media store.
#[async_trait]
pub trait MediaLink: Send + Sync {
    /// Re-read the file index of `location`.
    async fn refresh_file_list(&self, location: StorageLocation) -> Result<(), LinkError>;

    /// Snapshot of the last refreshed index for `location`.
    fn list_files(&self, location: StorageLocation) -> Vec<MediaFileRef>;

    async fn fetch_thumbnail(&self, file: &MediaFileRef) -> Result<Photo, LinkError>;

    async fn fetch_preview(&self, file: &MediaFileRef) -> Result<Photo, LinkError>;
}

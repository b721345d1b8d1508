//! External media storage for uploaded audio

pub mod cloudinary;

use async_trait::async_trait;
use thiserror::Error;

pub use cloudinary::CloudinaryStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Media storage is not configured")]
    NotConfigured,

    #[error("Media storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage answered with a non-success status
    #[error("Media storage rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Destroy answered but did not report `ok`
    #[error("Media storage could not delete {public_id}: {result}")]
    DestroyFailed { public_id: String, result: String },
}

/// An object accepted by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub public_id: String,
    pub url: String,
}

/// Object store holding the audio behind catalog entries
#[async_trait]
pub trait MediaStorage: Send + Sync {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<StoredMedia, StorageError>;

    async fn destroy(&self, public_id: &str) -> Result<(), StorageError>;
}

/// Storage used when no credentials are configured; every call fails
#[derive(Debug, Default)]
pub struct DisabledStorage;

#[async_trait]
impl MediaStorage for DisabledStorage {
    async fn upload(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<StoredMedia, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn destroy(&self, _public_id: &str) -> Result<(), StorageError> {
        Err(StorageError::NotConfigured)
    }
}

//! Cloudinary upload API client
//!
//! Requests are signed with SHA-256 over the sorted, `&`-joined signed
//! parameters followed by the API secret.

use async_trait::async_trait;
use emotune_common::config::StorageConfig;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{MediaStorage, StorageError, StoredMedia};

/// Audio lives under Cloudinary's `video` resource type; uploads and
/// destroys must agree on it or destroy never finds the object
const AUDIO_RESOURCE_TYPE: &str = "video";

/// Destroy result for an object that is already gone
const DESTROY_NOT_FOUND: &str = "not found";

pub struct CloudinaryStorage {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl CloudinaryStorage {
    pub fn new(
        base_url: impl Into<String>,
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cloud_name: cloud_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Build a client from configuration; `None` when credentials are incomplete
    pub fn from_config(config: &StorageConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }
        Some(Self::new(
            config.base_url.clone(),
            config.cloud_name.clone()?,
            config.api_key.clone()?,
            config.api_secret.clone()?,
        ))
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.base_url, self.cloud_name, resource_type, action
        )
    }

    /// Signature over `params`, which must not include file, api_key or the signature itself
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        sorted.sort_unstable();

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl MediaStorage for CloudinaryStorage {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<StoredMedia, StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("timestamp", timestamp.clone())]);
        let size = bytes.len();

        let form = Form::new()
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()));

        let response = self
            .client
            .post(self.endpoint(AUDIO_RESOURCE_TYPE, "upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check_status(response).await?.json().await?;

        info!(
            "Uploaded {} ({} bytes) as {}",
            file_name, size, uploaded.public_id
        );

        Ok(StoredMedia {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp.clone()),
        ]);

        let params = [
            ("public_id", public_id.to_string()),
            ("timestamp", timestamp),
            ("api_key", self.api_key.clone()),
            ("signature", signature),
            ("signature_algorithm", "sha256".to_string()),
        ];

        let response = self
            .client
            .post(self.endpoint(AUDIO_RESOURCE_TYPE, "destroy"))
            .form(&params)
            .send()
            .await?;
        let destroyed: DestroyResponse = Self::check_status(response).await?.json().await?;

        destroy_outcome(public_id, destroyed.result)
    }
}

/// Interpret a destroy `result`; an object that is already gone counts as removed
fn destroy_outcome(public_id: &str, result: String) -> Result<(), StorageError> {
    match result.as_str() {
        "ok" => {
            debug!("Destroyed media object {}", public_id);
            Ok(())
        }
        DESTROY_NOT_FOUND => {
            warn!("Media object {} was already gone", public_id);
            Ok(())
        }
        _ => Err(StorageError::DestroyFailed {
            public_id: public_id.to_string(),
            result,
        }),
    }
}

impl std::fmt::Debug for CloudinaryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryStorage")
            .field("base_url", &self.base_url)
            .field("cloud_name", &self.cloud_name)
            .finish_non_exhaustive()
    }
}

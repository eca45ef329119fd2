//! Artifact hosting
//!
//! The Instagram publish API ingests videos by URL, so every encoded reel is
//! uploaded once to a public host and the returned URL is shared by all
//! platforms.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::http_client::HttpClient;

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Uploads a local file and returns its public URL
#[async_trait]
pub trait ArtifactHost: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<String>;
}

/// Cloudinary signed video upload
pub struct CloudinaryHost {
    http: HttpClient,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryHost {
    #[must_use]
    pub fn new(http: HttpClient, cloud_name: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            http,
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            folder: "auto_reels".to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    fn upload_url(&self) -> String {
        format!("{CLOUDINARY_API_BASE}/{}/video/upload", self.cloud_name)
    }
}

/// Cloudinary request signature: SHA-256 over the alphabetically sorted
/// signed parameters followed by the API secret
#[must_use]
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ArtifactHost for CloudinaryHost {
    async fn upload(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map_or_else(|| "reel.mp4".to_string(), |n| n.to_string_lossy().to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", self.folder.as_str()),
                ("overwrite", "true"),
                ("timestamp", timestamp.as_str()),
            ],
            &self.api_secret,
        );

        tracing::info!("Uploading {} ({} bytes) to Cloudinary", file_name, bytes.len());

        let url = self.upload_url();
        let response = self
            .http
            .send(|client| {
                let form = Form::new()
                    .part("file", Part::bytes(bytes.clone()).file_name(file_name.clone()))
                    .text("api_key", self.api_key.clone())
                    .text("timestamp", timestamp.clone())
                    .text("folder", self.folder.clone())
                    .text("overwrite", "true")
                    .text("signature_algorithm", "sha256")
                    .text("signature", signature.clone());
                client.post(&url).timeout(self.timeout).multipart(form)
            })
            .await
            .context("Cloudinary upload failed")?;

        let body: UploadResponse = response
            .json()
            .await
            .context("Failed to parse Cloudinary response")?;

        let secure_url = body
            .secure_url
            .filter(|u| !u.is_empty())
            .context("Cloudinary response has no secure_url")?;

        tracing::info!("Hosted at {}", secure_url);
        Ok(secure_url)
    }
}

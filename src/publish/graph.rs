//! Graph API adapters
//!
//! - Instagram Reels: `POST /{ig}/media` (REELS container), poll
//!   `GET /{container}?fields=status_code`, `POST /{ig}/media_publish`
//! - Facebook Page reels: `POST /{page}/video_reels` with
//!   `upload_phase=start`, hosted-file upload through rupload, poll
//!   `GET /{video}?fields=status`, then `upload_phase=finish`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{JobStatus, Platform, PlatformApi};
use crate::http_client::HttpClient;
use crate::strategy::truncate_chars;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v23.0";
const RUPLOAD_BASE: &str = "https://rupload.facebook.com/video-upload/v23.0";

/// Caption limit accepted by both platforms
pub const CAPTION_LIMIT: usize = 2200;

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    status_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReelStartResponse {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatusResponse {
    #[serde(default)]
    status: VideoStatus,
}

#[derive(Debug, Default, Deserialize)]
struct VideoStatus {
    #[serde(default)]
    video_status: Option<String>,
    #[serde(default)]
    uploading_phase: Option<Phase>,
    #[serde(default)]
    processing_phase: Option<Phase>,
}

#[derive(Debug, Default, Deserialize)]
struct Phase {
    #[serde(default)]
    status: Option<String>,
}

/// Map an Instagram container `status_code`
#[must_use]
pub fn instagram_status(status_code: Option<&str>) -> JobStatus {
    match status_code {
        Some("FINISHED" | "PUBLISHED") => JobStatus::Finished,
        Some("ERROR" | "EXPIRED") => JobStatus::Error,
        _ => JobStatus::InProgress,
    }
}

fn facebook_status(status: &VideoStatus) -> JobStatus {
    fn phase(p: Option<&Phase>) -> Option<&str> {
        p.and_then(|p| p.status.as_deref())
    }

    if status.video_status.as_deref() == Some("error")
        || phase(status.uploading_phase.as_ref()) == Some("error")
        || phase(status.processing_phase.as_ref()) == Some("error")
    {
        return JobStatus::Error;
    }

    // Finishing only requires the upload to have landed; processing
    // continues after publish.
    if phase(status.uploading_phase.as_ref()) == Some("complete")
        || matches!(status.video_status.as_deref(), Some("ready" | "upload_complete"))
    {
        return JobStatus::Finished;
    }

    JobStatus::InProgress
}

/// Instagram Reels via a media container
pub struct InstagramReels {
    http: HttpClient,
    account_id: String,
    access_token: String,
}

impl InstagramReels {
    #[must_use]
    pub fn new(http: HttpClient, account_id: &str, access_token: &str) -> Self {
        Self {
            http,
            account_id: account_id.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl PlatformApi for InstagramReels {
    fn platform(&self) -> Platform {
        Platform::InstagramReels
    }

    async fn create(&self, video_url: &str, caption: &str) -> Result<String> {
        let url = format!("{GRAPH_API_BASE}/{}/media", self.account_id);
        let caption = truncate_chars(caption, CAPTION_LIMIT);

        let response = self
            .http
            .send(|client| {
                client.post(&url).form(&[
                    ("media_type", "REELS"),
                    ("video_url", video_url),
                    ("caption", caption),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Instagram /media failed")?;

        let body: IdResponse = response.json().await?;
        Ok(body.id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let url = format!("{GRAPH_API_BASE}/{job_id}");
        let response = self
            .http
            .send(|client| {
                client.get(&url).query(&[
                    ("fields", "status_code"),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Instagram container status failed")?;

        let body: ContainerStatus = response.json().await?;
        Ok(instagram_status(body.status_code.as_deref()))
    }

    async fn commit(&self, job_id: &str, _caption: &str) -> Result<String> {
        let url = format!("{GRAPH_API_BASE}/{}/media_publish", self.account_id);
        let response = self
            .http
            .send(|client| {
                client.post(&url).form(&[
                    ("creation_id", job_id),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Instagram /media_publish failed")?;

        let body: IdResponse = response.json().await?;
        Ok(body.id)
    }
}

/// Facebook Page reels via the resumable upload protocol
pub struct FacebookPageReels {
    http: HttpClient,
    page_id: String,
    access_token: String,
}

impl FacebookPageReels {
    #[must_use]
    pub fn new(http: HttpClient, page_id: &str, access_token: &str) -> Self {
        Self {
            http,
            page_id: page_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn reels_url(&self) -> String {
        format!("{GRAPH_API_BASE}/{}/video_reels", self.page_id)
    }
}

#[async_trait]
impl PlatformApi for FacebookPageReels {
    fn platform(&self) -> Platform {
        Platform::FacebookPage
    }

    async fn create(&self, video_url: &str, _caption: &str) -> Result<String> {
        let url = self.reels_url();
        let response = self
            .http
            .send(|client| {
                client.post(&url).form(&[
                    ("upload_phase", "start"),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Facebook video_reels start failed")?;
        let started: ReelStartResponse = response.json().await?;

        let upload_url = format!("{RUPLOAD_BASE}/{}", started.video_id);
        let authorization = format!("OAuth {}", self.access_token);
        let response = self
            .http
            .send(|client| {
                client
                    .post(&upload_url)
                    .header(reqwest::header::AUTHORIZATION, authorization.as_str())
                    .header("file_url", video_url)
            })
            .await
            .context("Facebook hosted-file upload failed")?;

        let uploaded: SuccessResponse = response.json().await?;
        if !uploaded.success {
            bail!("rupload did not accept {}", video_url);
        }

        Ok(started.video_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let url = format!("{GRAPH_API_BASE}/{job_id}");
        let response = self
            .http
            .send(|client| {
                client.get(&url).query(&[
                    ("fields", "status"),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Facebook video status failed")?;

        let body: VideoStatusResponse = response.json().await?;
        Ok(facebook_status(&body.status))
    }

    async fn commit(&self, job_id: &str, caption: &str) -> Result<String> {
        let url = self.reels_url();
        let caption = truncate_chars(caption, CAPTION_LIMIT);
        let response = self
            .http
            .send(|client| {
                client.post(&url).form(&[
                    ("upload_phase", "finish"),
                    ("video_id", job_id),
                    ("video_state", "PUBLISHED"),
                    ("description", caption),
                    ("access_token", self.access_token.as_str()),
                ])
            })
            .await
            .context("Facebook video_reels finish failed")?;

        let body: SuccessResponse = response.json().await?;
        if !body.success {
            bail!("video_reels finish returned success=false for {}", job_id);
        }
        Ok(job_id.to_string())
    }
}

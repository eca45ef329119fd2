//! Publication state machine
//!
//! Both platforms publish asynchronously: a container/job is created, the
//! platform processes the video in the background, and the job must be
//! committed once processing finishes.
//!
//! ```text
//! CREATE ──ok──> POLL ──FINISHED──> COMMIT ──ok──> published
//!   │             │ ERROR / TIMEOUT     │ err
//!   └──err────────┴─────────────────────┴──> retry once after a delay
//! ```
//!
//! [`PublishMachine`] drives that sequence against any [`PlatformApi`]; the
//! Graph API adapters live in [`graph`].

pub mod graph;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub use graph::{FacebookPageReels, InstagramReels};

/// Publish target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    FacebookPage,
    InstagramReels,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FacebookPage => write!(f, "facebook"),
            Self::InstagramReels => write!(f, "instagram"),
        }
    }
}

/// Server-side processing state of a publication job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Created,
    InProgress,
    Finished,
    Error,
    Timeout,
}

impl JobStatus {
    /// Whether polling should stop
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Timeout)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// One publication attempt on one platform
#[derive(Debug, Clone)]
pub struct PublicationJob {
    pub platform: Platform,
    pub job_id: String,
    pub status: JobStatus,
    /// 1-based attempt number
    pub attempt: u32,
}

/// Platform publish protocol: create, poll, commit
#[async_trait]
pub trait PlatformApi: Send + Sync {
    fn platform(&self) -> Platform;

    /// Start a publication job for a hosted video. Returns the job id.
    async fn create(&self, video_url: &str, caption: &str) -> Result<String>;

    /// Current processing status of a job
    async fn status(&self, job_id: &str) -> Result<JobStatus>;

    /// Make a finished job public. Returns the published object id.
    async fn commit(&self, job_id: &str, caption: &str) -> Result<String>;
}

/// Why a publication failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("job creation failed: {0}")]
    Create(String),

    #[error("job {job_id} ended with status {status}")]
    Job { job_id: String, status: JobStatus },

    #[error("job {job_id} still processing after {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("commit of job {job_id} failed: {reason}")]
    Commit { job_id: String, reason: String },
}

/// Timing and retry limits for [`PublishMachine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPolicy {
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub retry_delay: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(6),
            max_wait: Duration::from_secs(150),
            retry_delay: Duration::from_secs(4),
            max_attempts: 2,
        }
    }
}

/// Result of publishing one video to one platform
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub platform: Platform,
    pub attempts: u32,
    /// Published object id, or the last failure
    pub result: Result<String, PublishError>,
}

impl PublishOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives create → poll → commit with a bounded whole-sequence retry
#[derive(Debug, Clone, Default)]
pub struct PublishMachine {
    policy: PublishPolicy,
}

impl PublishMachine {
    #[must_use]
    pub fn new(policy: PublishPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &PublishPolicy {
        &self.policy
    }

    /// Publish `video_url` on the platform behind `api`
    pub async fn publish(
        &self,
        api: &dyn PlatformApi,
        video_url: &str,
        caption: &str,
    ) -> PublishOutcome {
        let platform = api.platform();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(api, video_url, caption, attempt).await {
                Ok(id) => {
                    info!("Published on {}: id={} (attempt {})", platform, id, attempt);
                    return PublishOutcome {
                        platform,
                        attempts: attempt,
                        result: Ok(id),
                    };
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Publish on {} failed (attempt {}): {}; retrying in {:?}",
                        platform, attempt, e, self.policy.retry_delay
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Publish on {} failed after {} attempts: {}",
                        platform, attempt, e
                    );
                    return PublishOutcome {
                        platform,
                        attempts: attempt,
                        result: Err(e),
                    };
                }
            }
        }
    }

    async fn attempt(
        &self,
        api: &dyn PlatformApi,
        video_url: &str,
        caption: &str,
        attempt: u32,
    ) -> Result<String, PublishError> {
        let job_id = api
            .create(video_url, caption)
            .await
            .map_err(|e| PublishError::Create(format!("{e:#}")))?;

        let mut job = PublicationJob {
            platform: api.platform(),
            job_id,
            status: JobStatus::Created,
            attempt,
        };
        debug!("Created {} job {} (attempt {})", job.platform, job.job_id, job.attempt);

        self.poll(api, &mut job).await;

        match job.status {
            JobStatus::Finished => api.commit(&job.job_id, caption).await.map_err(|e| {
                PublishError::Commit {
                    job_id: job.job_id.clone(),
                    reason: format!("{e:#}"),
                }
            }),
            JobStatus::Timeout => Err(PublishError::Timeout {
                job_id: job.job_id,
                waited: self.policy.max_wait,
            }),
            status => Err(PublishError::Job {
                job_id: job.job_id,
                status,
            }),
        }
    }

    /// Poll until the job is FINISHED, ERROR or the wait budget runs out
    async fn poll(&self, api: &dyn PlatformApi, job: &mut PublicationJob) {
        let started = Instant::now();

        loop {
            if started.elapsed() >= self.policy.max_wait {
                job.status = JobStatus::Timeout;
                return;
            }

            match api.status(&job.job_id).await {
                Ok(status) if status.is_terminal() => {
                    info!("{} job {} status: {}", job.platform, job.job_id, status);
                    job.status = status;
                    return;
                }
                Ok(status) => {
                    debug!("{} job {} status: {}", job.platform, job.job_id, status);
                    job.status = JobStatus::InProgress;
                }
                // The HTTP layer already retried; treat as still processing
                Err(e) => {
                    warn!("{} status check for {} failed: {:#}", job.platform, job.job_id, e);
                    job.status = JobStatus::InProgress;
                }
            }

            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}

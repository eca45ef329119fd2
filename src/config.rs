//! Application configuration
//!
//! Two sources:
//! - a TOML file (`--config`, or `~/.config/reelcast/config.toml` when it
//!   exists) for layout, timing and wording, every key optional
//! - the environment (optionally seeded from `.env`) for credentials
//!
//! Both are read once at startup; the resulting values are immutable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::LayoutSpec;
use crate::publish::PublishPolicy;
use crate::strategy::{CaptionConfig, PipelineVariant};

/// Startup configuration failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("neither FACEBOOK_PAGE_ID nor INSTAGRAM_ID is set; nothing to publish to")]
    NoPlatform,

    #[error("{var} is not a valid URL: {reason}")]
    InvalidUrl { var: &'static str, reason: String },
}

/// Video output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub seconds: u32,
    pub fps: u32,
    /// Background track, muxed only when the file exists
    pub audio_path: Option<PathBuf>,
    /// ffmpeg binary; looked up on `PATH` when unset
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            seconds: 10,
            fps: 25,
            audio_path: Some(PathBuf::from("audio_fundo.mp3")),
            ffmpeg_path: None,
        }
    }
}

/// Batch size and cadence of the main loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub batch_size: usize,
    pub interval_secs: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            interval_secs: 300,
        }
    }
}

/// Publication polling and retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub retry_delay_secs: u64,
    pub max_attempts: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 6,
            max_wait_secs: 150,
            retry_delay_secs: 4,
            max_attempts: 2,
        }
    }
}

impl PublishConfig {
    #[must_use]
    pub fn to_policy(&self) -> PublishPolicy {
        PublishPolicy {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            max_attempts: self.max_attempts,
        }
    }
}

/// Everything that is not a secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where cover art and videos are written
    pub output_dir: PathBuf,
    pub layout: LayoutSpec,
    pub video: VideoConfig,
    pub cycle: CycleConfig,
    pub publish: PublishConfig,
    pub caption: CaptionConfig,
    pub variant: PipelineVariant,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            layout: LayoutSpec::default(),
            video: VideoConfig::default(),
            cycle: CycleConfig::default(),
            publish: PublishConfig::default(),
            caption: CaptionConfig::default(),
            variant: PipelineVariant::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the default location if it exists.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = default_config_path();
                if !default.exists() {
                    tracing::debug!("No config at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document; absent keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle.interval_secs)
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelcast")
        .join("config.toml")
}

/// Secrets and account identifiers from the environment
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub wp_url: String,
    pub access_token: String,
    pub facebook_page_id: Option<String>,
    pub instagram_id: Option<String>,
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: String,
    pub cloudinary_api_secret: String,
}

impl Credentials {
    /// Read from the process environment, loading `.env` first if present
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or `WP_URL` is
    /// not an absolute http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup; empty values count as unset
    ///
    /// # Errors
    ///
    /// Same as [`Credentials::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| optional(key).ok_or(ConfigError::MissingVar(key));

        let wp_url = required("WP_URL")?;
        match url::Url::parse(&wp_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(u) => {
                return Err(ConfigError::InvalidUrl {
                    var: "WP_URL",
                    reason: format!("unsupported scheme {}", u.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidUrl {
                    var: "WP_URL",
                    reason: e.to_string(),
                })
            }
        }

        let facebook_page_id = optional("FACEBOOK_PAGE_ID");
        let instagram_id = optional("INSTAGRAM_ID");
        if facebook_page_id.is_none() && instagram_id.is_none() {
            return Err(ConfigError::NoPlatform);
        }

        Ok(Self {
            wp_url,
            access_token: required("USER_ACCESS_TOKEN")?,
            facebook_page_id,
            instagram_id,
            cloudinary_cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
            cloudinary_api_key: required("CLOUDINARY_API_KEY")?,
            cloudinary_api_secret: required("CLOUDINARY_API_SECRET")?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("wp_url", &self.wp_url)
            .field("access_token", &"<redacted>")
            .field("facebook_page_id", &self.facebook_page_id)
            .field("instagram_id", &self.instagram_id)
            .field("cloudinary_cloud_name", &self.cloudinary_cloud_name)
            .field("cloudinary_api_key", &self.cloudinary_api_key)
            .field("cloudinary_api_secret", &"<redacted>")
            .finish()
    }
}

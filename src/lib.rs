//! `reelcast` - turn news articles into vertical reels
//!
//! # Features
//!
//! - **Layout**: fixed 9:16 template with cover-fitted photo, category band,
//!   logo, wrapped title and handle footer
//! - **Encoding**: still image + optional background track to H.264 MP4 via
//!   ffmpeg
//! - **Hosting**: signed Cloudinary upload for a public video URL
//! - **Publishing**: Facebook Page reels and Instagram Reels through the
//!   Graph API, with polling and a single whole-sequence retry
//! - **Orchestration**: periodic cycles over the newest WordPress posts,
//!   isolating every per-article failure
//!
//! # Example
//!
//! ```rust,no_run
//! use reelcast::{
//!     AppConfig, CloudinaryHost, Encoder, HttpClient, InstagramReels, LayoutAssets,
//!     PipelineSettings, ReelPipeline, WordPressSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let http = HttpClient::new()?;
//!     let pipeline = ReelPipeline::new(
//!         PipelineSettings::from_config(&config),
//!         config.layout.clone(),
//!         LayoutAssets::load(&config.layout),
//!         Box::new(WordPressSource::new(http.clone(), "https://example.com")),
//!         Box::new(Encoder::new()),
//!         Box::new(CloudinaryHost::new(http.clone(), "cloud", "key", "secret")),
//!     )
//!     .with_platform(Box::new(InstagramReels::new(http, "1789", "token")));
//!
//!     let report = pipeline.run_cycle().await;
//!     println!("Published {} reels", report.published);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod encoder;
pub mod hosting;
pub mod http_client;
pub mod layout;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod strategy;

pub use config::{AppConfig, ConfigError, Credentials};
pub use encoder::{Encoder, EncoderConfig, EncoderProfile, VideoEncoder};
pub use hosting::{ArtifactHost, CloudinaryHost};
pub use http_client::{HttpClient, HttpError, HttpSettings};
pub use layout::{compose, Composition, LayoutAssets, LayoutSpec, LayoutWarning};
pub use pipeline::{ArticleOutcome, CycleReport, PipelineSettings, ReelPipeline};
pub use publish::{
    FacebookPageReels, InstagramReels, JobStatus, Platform, PlatformApi, PublishError,
    PublishMachine, PublishOutcome, PublishPolicy,
};
pub use source::{ArticleSource, SourceArticle, WordPressSource};
pub use strategy::{CaptionConfig, CaptionStrategy, CategoryStrategy, PipelineVariant};

/// Version of reelcast
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

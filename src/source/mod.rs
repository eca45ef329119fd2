//! Article sources.
//!
//! An [`ArticleSource`] hands the pipeline a batch of [`SourceArticle`]s and
//! downloads their photos. The only production implementation is
//! [`WordPressSource`](wordpress::WordPressSource), backed by the WordPress
//! REST API.

pub mod wordpress;

use anyhow::Result;
use async_trait::async_trait;

pub use wordpress::WordPressSource;

/// One article as fetched from the CMS, already reduced to plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArticle {
    /// CMS post identifier
    pub id: u64,
    /// Title with HTML entities decoded
    pub title: String,
    /// Category taxonomy names, in CMS order (may be empty)
    pub categories: Vec<String>,
    /// Featured photo, or the first image found in the body
    pub photo_url: Option<String>,
    /// Canonical permalink
    pub link: String,
    /// Body with markup stripped
    pub body: String,
}

/// Read-only, count-paginated article feed
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Short lowercase source name (e.g., `"wordpress"`).
    fn name(&self) -> &'static str;

    /// Fetch the newest `limit` articles.
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<SourceArticle>>;

    /// Download the raw bytes of an article photo.
    async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>>;
}

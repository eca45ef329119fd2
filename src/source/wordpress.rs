//! WordPress REST API source.
//!
//! Fetches `/wp-json/wp/v2/posts?_embed` so featured media and taxonomy terms
//! arrive in the same response. Photo resolution order:
//!
//! 1. `_embedded["wp:featuredmedia"][0].source_url`
//! 2. `jetpack_featured_media_url` (exposed by some installs)
//! 3. first `<img src>` in the rendered body
//!
//! Only absolute `http(s)` URLs are accepted at every step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;

use super::{ArticleSource, SourceArticle};
use crate::http_client::HttpClient;

/// WordPress site exposing the REST API
pub struct WordPressSource {
    http: HttpClient,
    base_url: String,
}

impl WordPressSource {
    /// `base_url` is the site root, e.g. `https://example.com`
    #[must_use]
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn posts_url(&self, limit: usize) -> String {
        format!(
            "{}/wp-json/wp/v2/posts?_embed&per_page={limit}&orderby=date",
            self.base_url
        )
    }
}

#[async_trait]
impl ArticleSource for WordPressSource {
    fn name(&self) -> &'static str {
        "wordpress"
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<SourceArticle>> {
        let url = self.posts_url(limit);
        tracing::debug!("Fetching posts from {}", url);

        let response = self
            .http
            .send(|client| client.get(&url))
            .await
            .context("Failed to fetch WordPress posts")?;
        let body = response.text().await?;

        let articles = parse_posts(&body)?;
        tracing::info!("Received {} posts", articles.len());
        Ok(articles)
    }

    async fn fetch_photo(&self, url: &str) -> Result<Vec<u8>> {
        self.http
            .get_bytes(url)
            .await
            .with_context(|| format!("Failed to download photo {url}"))
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    content: Rendered,
    #[serde(default)]
    link: String,
    #[serde(default, rename = "_embedded")]
    embedded: Option<WpEmbedded>,
    #[serde(default)]
    jetpack_featured_media_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Default, Deserialize)]
struct WpEmbedded {
    #[serde(default, rename = "wp:featuredmedia")]
    featured_media: Vec<Option<WpMedia>>,
    #[serde(default, rename = "wp:term")]
    terms: Vec<Option<Vec<WpTerm>>>,
}

#[derive(Debug, Deserialize)]
struct WpMedia {
    #[serde(default)]
    source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WpTerm {
    #[serde(default)]
    taxonomy: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Parse a `/wp/v2/posts` response body
pub fn parse_posts(json: &str) -> Result<Vec<SourceArticle>> {
    let posts: Vec<WpPost> =
        serde_json::from_str(json).context("Failed to parse WordPress posts response")?;
    Ok(posts.into_iter().map(into_article).collect())
}

fn into_article(post: WpPost) -> SourceArticle {
    let photo_url = featured_photo_url(&post).or_else(|| first_body_image(&post.content.rendered));
    let categories = post
        .embedded
        .as_ref()
        .map(category_names)
        .unwrap_or_default();

    SourceArticle {
        id: post.id,
        title: html_to_text(&post.title.rendered),
        categories,
        photo_url,
        link: post.link,
        body: html_to_text(&post.content.rendered),
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn featured_photo_url(post: &WpPost) -> Option<String> {
    let embedded = post
        .embedded
        .as_ref()
        .and_then(|e| e.featured_media.first())
        .and_then(Option::as_ref)
        .and_then(|m| m.source_url.clone())
        .filter(|u| is_http_url(u));

    embedded.or_else(|| {
        post.jetpack_featured_media_url
            .clone()
            .filter(|u| is_http_url(u))
    })
}

/// First `<img src>` in an HTML fragment
fn first_body_image(html: &str) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| is_http_url(src))
        .map(str::to_string)
}

fn category_names(embedded: &WpEmbedded) -> Vec<String> {
    embedded
        .terms
        .iter()
        .flatten()
        .flatten()
        .filter(|t| t.taxonomy.as_deref() == Some("category"))
        .filter_map(|t| t.name.as_deref())
        .map(html_to_text)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Strip markup, decode entities and collapse whitespace
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

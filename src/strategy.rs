//! Caption and category strategies
//!
//! The pipeline runs in one of a few variants that differ only in how the
//! caption is worded, where the band label comes from and which encoder
//! profile is used. [`PipelineVariant`] bundles the three choices.

use serde::{Deserialize, Serialize};

use crate::encoder::EncoderProfile;
use crate::source::SourceArticle;

/// How the post caption is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStrategy {
    /// Title, "Mais em: <site>", link
    #[default]
    TitleAndLink,
    /// Title, opening sentences of the body, link
    TitleExcerptAndLink,
}

/// Where the category band label comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStrategy {
    /// First category term, falling back to the configured default
    #[default]
    Taxonomy,
    /// Always the configured fixed label
    Fixed,
}

/// One pipeline flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineVariant {
    pub caption: CaptionStrategy,
    pub category: CategoryStrategy,
    pub encoder: EncoderProfile,
}

/// Caption and label wording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Site name shown after "Mais em:"
    pub site_label: String,
    /// Platform caption limit, in characters
    pub max_length: usize,
    /// Excerpt budget for [`CaptionStrategy::TitleExcerptAndLink`]
    pub excerpt_length: usize,
    /// Label used when an article has no category term
    pub fallback_category: String,
    /// Label used by [`CategoryStrategy::Fixed`]
    pub fixed_category: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            site_label: "jornalvozdolitoral.com".to_string(),
            max_length: 2200,
            excerpt_length: 300,
            fallback_category: "NOTÍCIAS".to_string(),
            fixed_category: "Notícia".to_string(),
        }
    }
}

/// Build the caption for an article, capped at `config.max_length` chars
#[must_use]
pub fn build_caption(
    article: &SourceArticle,
    strategy: CaptionStrategy,
    config: &CaptionConfig,
) -> String {
    let title = article.title.trim();
    let mut caption = match strategy {
        CaptionStrategy::TitleAndLink => {
            format!("{title}\n\nMais em: {}", config.site_label)
        }
        CaptionStrategy::TitleExcerptAndLink => {
            let excerpt = excerpt(&article.body, config.excerpt_length);
            if excerpt.is_empty() {
                title.to_string()
            } else {
                format!("{title}\n\n{excerpt}")
            }
        }
    };

    if !article.link.is_empty() {
        caption.push('\n');
        caption.push_str(&article.link);
    }

    truncate_chars(&caption, config.max_length).to_string()
}

/// Label painted in the category band
#[must_use]
pub fn resolve_category(
    article: &SourceArticle,
    strategy: CategoryStrategy,
    config: &CaptionConfig,
) -> String {
    match strategy {
        CategoryStrategy::Taxonomy => article
            .categories
            .iter()
            .map(|c| c.trim())
            .find(|c| !c.is_empty())
            .unwrap_or(config.fallback_category.as_str())
            .to_string(),
        CategoryStrategy::Fixed => config.fixed_category.clone(),
    }
}

/// Longest prefix of at most `max_chars` characters
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Whole sentences from the start of `body` fitting in `budget` chars.
/// A first sentence longer than the budget is cut at a word boundary.
fn excerpt(body: &str, budget: usize) -> String {
    let body = body.trim();
    if body.chars().count() <= budget {
        return body.to_string();
    }

    let mut end = 0;
    for (count, (idx, ch)) in body.char_indices().enumerate() {
        if count >= budget {
            break;
        }
        if matches!(ch, '.' | '!' | '?') {
            end = idx + ch.len_utf8();
        }
    }

    if end > 0 {
        return body[..end].to_string();
    }

    let cut = truncate_chars(body, budget);
    let cut = cut.rfind(' ').map_or(cut, |i| &cut[..i]);
    format!("{}…", cut.trim_end())
}

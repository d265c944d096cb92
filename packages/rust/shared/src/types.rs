//! Core domain types for Autopress: sites, articles, categories, statistics.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AutopressError, Result};

// ---------------------------------------------------------------------------
// ArticleId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for article identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

impl ArticleId {
    /// Generate a new time-sortable article identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArticleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// CMS-assigned taxonomy identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One taxonomy node as currently defined on the target CMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Domain vocabulary associated with a canonical category label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProfile {
    /// Canonical label, possibly multi-part (`ブログ・アフィリエイト副業`).
    pub label: String,
    /// Keywords scored against article text. Never empty.
    pub keywords: Vec<String>,
}

// ---------------------------------------------------------------------------
// Topics and generation output
// ---------------------------------------------------------------------------

/// A candidate article topic proposed by the strategist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSuggestion {
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub expected_impact: String,
}

/// Article body as returned by the generator, before it becomes an [`Article`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    /// Markdown body.
    pub content: String,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub description: String,
    /// Model that produced the text, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// Lifecycle status of a stored article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Published,
    Error,
}

impl ArticleStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ArticleStatus {
    type Err = AutopressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "error" => Ok(Self::Error),
            other => Err(AutopressError::validation(format!(
                "unknown article status '{other}'"
            ))),
        }
    }
}

/// Result of a successful CMS publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    /// CMS post id.
    pub id: u64,
    /// Canonical public URL of the post.
    pub link: String,
}

/// A generated article as persisted in the article store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub site_id: String,
    pub title: String,
    /// Markdown body.
    pub content: String,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub description: String,
    pub status: ArticleStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// CMS post id once published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<u64>,
    /// CMS canonical URL once published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    /// Strategy that led to this article, if it came from the strategist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<TopicSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Article {
    /// Build a new draft from generator output.
    pub fn draft(
        site_id: impl Into<String>,
        generated: GeneratedArticle,
        topic: Option<TopicSuggestion>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ArticleId::new(),
            site_id: site_id.into(),
            title: generated.title,
            content: generated.content,
            tags: generated.tags,
            excerpt: generated.excerpt,
            description: generated.description,
            status: ArticleStatus::Draft,
            created_at,
            published_at: None,
            post_id: None,
            post_url: None,
            topic,
            model: generated.model,
        }
    }

    /// Transition `draft → published`, recording the CMS identity.
    pub fn mark_published(&mut self, post: &PublishedPost, at: DateTime<Utc>) -> Result<()> {
        self.ensure_draft("published")?;
        self.status = ArticleStatus::Published;
        self.post_id = Some(post.id);
        self.post_url = Some(post.link.clone());
        self.published_at = Some(at);
        Ok(())
    }

    /// Transition `draft → error`.
    pub fn mark_error(&mut self) -> Result<()> {
        self.ensure_draft("error")?;
        self.status = ArticleStatus::Error;
        Ok(())
    }

    fn ensure_draft(&self, target: &str) -> Result<()> {
        if self.status != ArticleStatus::Draft {
            return Err(AutopressError::validation(format!(
                "article {} is {}, only drafts can become {target}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// Hours of the day during which automated publishing is permitted.
///
/// `start > end` wraps past midnight; `start == end` covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingWindow {
    pub start: u32,
    pub end: u32,
}

/// Which service provides the cover image for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageService {
    None,
    #[default]
    Auto,
    GptImage,
    GeminiImage,
    Unsplash,
}

impl ImageService {
    /// Generator name requested by this setting, if it names one explicitly.
    pub fn generator_preference(&self) -> Option<&'static str> {
        match self {
            Self::GptImage => Some("gpt_image"),
            Self::GeminiImage => Some("gemini_image"),
            _ => None,
        }
    }

    /// Whether a generative service should be attempted first.
    pub fn is_generative(&self) -> bool {
        matches!(self, Self::Auto | Self::GptImage | Self::GeminiImage)
    }
}

impl std::str::FromStr for ImageService {
    type Err = AutopressError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "auto" => Ok(Self::Auto),
            "gpt_image" => Ok(Self::GptImage),
            "gemini_image" => Ok(Self::GeminiImage),
            "unsplash" => Ok(Self::Unsplash),
            other => Err(AutopressError::config(format!(
                "unknown image service '{other}' (expected none, auto, gpt_image, gemini_image or unsplash)"
            ))),
        }
    }
}

/// Per-site cover image preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSettings {
    pub service: ImageService,
    pub style: String,
    pub tone: String,
    pub instructions: String,
    pub quality: String,
    pub avoid_terms: Vec<String>,
    pub size: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            service: ImageService::Auto,
            style: "photorealistic".into(),
            tone: String::new(),
            instructions: String::new(),
            quality: "8K, ultra detailed, high resolution".into(),
            avoid_terms: vec!["low quality".into(), "blurry".into(), "distorted".into()],
            size: "1536x1024".into(),
        }
    }
}

/// CMS login, passed through to the publisher untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct CmsCredentials {
    pub username: String,
    pub app_password: String,
}

impl std::fmt::Debug for CmsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmsCredentials")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

/// Runtime site record, merged from a `[[sites]]` entry and `[automation]` defaults.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    pub name: String,
    /// Base URL of the WordPress site.
    pub url: String,
    pub genre: String,
    pub target_audience: String,
    pub keywords_focus: Vec<String>,
    /// Maximum articles generated per local calendar day.
    pub daily_quota: u32,
    /// Politeness delay after this site's cycle.
    pub min_interval: Duration,
    pub operating_hours: OperatingWindow,
    pub auto_publish: bool,
    pub require_approval: bool,
    /// Target article length in characters.
    pub article_length: u32,
    pub tone: String,
    pub image: ImageSettings,
    pub credentials: Option<CmsCredentials>,
    pub enabled: bool,
}

impl Site {
    /// Whether a fresh draft should go straight to the CMS.
    pub fn publishes_automatically(&self) -> bool {
        self.auto_publish && !self.require_approval && self.credentials.is_some()
    }
}

// ---------------------------------------------------------------------------
// Strategist inputs
// ---------------------------------------------------------------------------

/// Summary of a site's published history, fed to the strategist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PastAnalysis {
    pub total_articles: usize,
    /// Newest first.
    pub titles: Vec<String>,
    pub keyword_frequency: BTreeMap<String, usize>,
    pub newest_article_date: Option<DateTime<Utc>>,
    pub oldest_article_date: Option<DateTime<Utc>>,
}

/// A post already live on the CMS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsPost {
    pub id: u64,
    pub title: String,
    pub category_ids: Vec<u64>,
    /// Plain-text excerpt of the rendered content.
    pub content_sample: String,
}

/// Summary of what is already on the CMS, optional strategist input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CmsAnalysis {
    pub total_posts: usize,
    pub titles: Vec<String>,
    pub category_ids: Vec<u64>,
    pub content_samples: Vec<String>,
}

impl CmsAnalysis {
    /// Aggregate a list of recent posts.
    pub fn from_posts(posts: &[CmsPost]) -> Self {
        Self {
            total_posts: posts.len(),
            titles: posts.iter().map(|p| p.title.clone()).collect(),
            category_ids: posts.iter().flat_map(|p| p.category_ids.iter().copied()).collect(),
            content_samples: posts.iter().map(|p| p.content_sample.clone()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatistics
// ---------------------------------------------------------------------------

/// A counted event in the automation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatEvent {
    Generated,
    Published,
    Error,
}

/// Process-wide automation counters; persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_generated: u64,
    pub total_published: u64,
    pub errors: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl RunStatistics {
    /// Increment the counter for `event`.
    pub fn record(&mut self, event: StatEvent) {
        match event {
            StatEvent::Generated => self.total_generated += 1,
            StatEvent::Published => self.total_published += 1,
            StatEvent::Error => self.errors += 1,
        }
    }

    /// Stamp the end of a run.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article() -> Article {
        Article::draft(
            "site-1",
            GeneratedArticle {
                title: "初心者向け副業ガイド".into(),
                content: "## はじめに\n本文".into(),
                tags: vec!["副業".into()],
                excerpt: "本文".into(),
                description: "説明".into(),
                model: Some("claude-sonnet-4-20250514".into()),
            },
            None,
            Utc::now(),
        )
    }

    #[test]
    fn article_id_roundtrip() {
        let id = ArticleId::new();
        let parsed: ArticleId = id.to_string().parse().expect("parse ArticleId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn draft_can_be_published_once() {
        let mut article = sample_article();
        let post = PublishedPost {
            id: 42,
            link: "https://example.com/?p=42".into(),
        };
        article.mark_published(&post, Utc::now()).expect("publish draft");
        assert_eq!(article.status, ArticleStatus::Published);
        assert_eq!(article.post_id, Some(42));

        let err = article.mark_error().unwrap_err();
        assert!(err.to_string().contains("only drafts"));
        assert!(article.mark_published(&post, Utc::now()).is_err());
    }

    #[test]
    fn draft_can_become_error() {
        let mut article = sample_article();
        article.mark_error().expect("draft -> error");
        assert_eq!(article.status, ArticleStatus::Error);
    }

    #[test]
    fn status_parses_storage_form() {
        for status in [ArticleStatus::Draft, ArticleStatus::Published, ArticleStatus::Error] {
            assert_eq!(status.as_str().parse::<ArticleStatus>().unwrap(), status);
        }
        assert!("下書き".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = CmsCredentials {
            username: "editor".into(),
            app_password: "abcd efgh".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("editor"));
        assert!(!debug.contains("abcd"));
    }

    #[test]
    fn stats_record_and_touch() {
        let mut stats = RunStatistics::default();
        stats.record(StatEvent::Generated);
        stats.record(StatEvent::Generated);
        stats.record(StatEvent::Error);
        assert_eq!(stats.total_generated, 2);
        assert_eq!(stats.errors, 1);
        assert!(stats.last_run.is_none());
        stats.touch(Utc::now());
        assert!(stats.last_run.is_some());
    }

    #[test]
    fn image_service_serde_names() {
        let json = serde_json::to_string(&ImageService::GeminiImage).unwrap();
        assert_eq!(json, r#""gemini_image""#);
        assert_eq!(ImageService::GptImage.generator_preference(), Some("gpt_image"));
        assert!(ImageService::Auto.is_generative());
        assert!(!ImageService::Unsplash.is_generative());
    }

    #[test]
    fn cms_analysis_aggregates_posts() {
        let posts = vec![
            CmsPost {
                id: 1,
                title: "A".into(),
                category_ids: vec![3, 4],
                content_sample: "a".into(),
            },
            CmsPost {
                id: 2,
                title: "B".into(),
                category_ids: vec![4],
                content_sample: "b".into(),
            },
        ];
        let analysis = CmsAnalysis::from_posts(&posts);
        assert_eq!(analysis.total_posts, 2);
        assert_eq!(analysis.titles, vec!["A", "B"]);
        assert_eq!(analysis.category_ids, vec![3, 4, 4]);
    }
}

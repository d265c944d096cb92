//! Async traits for the external services the publishing cycle talks to.
//!
//! Concrete implementations live in `autopress-llm`, `autopress-wordpress`
//! and `autopress-images`; tests substitute in-memory fakes.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CmsAnalysis, CmsPost, Category, CategoryId, GeneratedArticle, PastAnalysis, PublishedPost,
    Site, TopicSuggestion,
};

// ---------------------------------------------------------------------------
// Content generation
// ---------------------------------------------------------------------------

/// Everything the generator needs for one article.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub keywords: Vec<String>,
    /// Target length in characters.
    pub length: u32,
    pub tone: String,
    pub genre: String,
    pub target_audience: String,
}

/// Proposes article topics for a site.
#[async_trait]
pub trait TopicStrategist: Send + Sync {
    async fn generate_content_strategy(
        &self,
        site: &Site,
        past: &PastAnalysis,
        cms: Option<&CmsAnalysis>,
    ) -> Result<Vec<TopicSuggestion>>;
}

/// Writes an article body for a topic.
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    async fn generate_article(&self, request: &GenerationRequest) -> Result<GeneratedArticle>;
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Image payload handed to [`ContentPublisher::upload_media`].
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A file written by a generative image service.
    File(PathBuf),
    /// A remote image (stock photo) to download and re-upload.
    Url { url: String, filename: String },
}

/// A post ready to send to the CMS.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    /// Markdown body; the publisher renders it.
    pub content: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub category: Option<CategoryId>,
    pub featured_media: Option<u64>,
    /// `publish` or `draft`.
    pub status: String,
}

/// A connected CMS endpoint for one site.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    async fn test_connection(&self) -> Result<bool>;
    async fn get_categories(&self) -> Result<Vec<Category>>;
    /// Upload an image, returning the media id.
    async fn upload_media(&self, source: MediaSource, alt_text: &str) -> Result<u64>;
    async fn publish_post(&self, draft: &PostDraft) -> Result<PublishedPost>;
    /// Most recent published posts, newest first.
    async fn recent_posts(&self, limit: usize) -> Result<Vec<CmsPost>>;
}

/// Builds a [`ContentPublisher`] for a site; `None` when the site has no credentials.
#[async_trait]
pub trait PublisherFactory: Send + Sync {
    async fn connect(&self, site: &Site) -> Result<Option<Box<dyn ContentPublisher>>>;
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// A generative image service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Stable service name (`gpt_image`, `gemini_image`).
    fn name(&self) -> &str;

    /// Generate an image for the prompt; `Ok(None)` when the service returned nothing.
    async fn generate(&self, prompt: &str, size: &str) -> Result<Option<PathBuf>>;
}

/// A stock photo search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockPhoto {
    pub id: String,
    /// Direct image URL to download.
    pub url: String,
    pub alt_text: String,
    pub photographer: String,
}

/// A stock photo provider.
#[async_trait]
pub trait StockPhotoService: Send + Sync {
    /// Every hit for the query, in the provider's relevance order.
    async fn search(&self, query: &str) -> Result<Vec<StockPhoto>>;

    /// Report a download back to the provider.
    async fn acknowledge_download(&self, photo_id: &str) -> Result<()>;
}

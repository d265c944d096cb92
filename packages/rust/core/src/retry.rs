//! Two-attempt article generation.

use tracing::{info, warn};

use autopress_shared::{
    ArticleGenerator, GeneratedArticle, GenerationRequest, Result, Site, TopicSuggestion,
};

/// Upper bound on the retry attempt's length.
pub const RETRY_LENGTH_CAP: u32 = 3000;

/// Length used for the retry attempt.
pub fn retry_length(length: u32) -> u32 {
    RETRY_LENGTH_CAP.min(length / 2)
}

/// A primary request and the single shorter fallback tried after it fails.
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    primary: GenerationRequest,
    fallback: GenerationRequest,
}

impl GenerationPolicy {
    /// The primary attempt uses `varied_keywords` at the site's length; the
    /// fallback keeps the topic's own keywords at [`retry_length`].
    pub fn for_topic(site: &Site, topic: &TopicSuggestion, varied_keywords: Vec<String>) -> Self {
        let primary = GenerationRequest {
            topic: topic.title.clone(),
            keywords: varied_keywords,
            length: site.article_length,
            tone: site.tone.clone(),
            genre: site.genre.clone(),
            target_audience: site.target_audience.clone(),
        };
        let fallback = GenerationRequest {
            keywords: topic.keywords.clone(),
            length: retry_length(site.article_length),
            ..primary.clone()
        };
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &GenerationRequest {
        &self.primary
    }

    pub fn fallback(&self) -> &GenerationRequest {
        &self.fallback
    }

    /// Run the primary attempt, then the fallback once if it fails.
    ///
    /// Returns the fallback's error when both attempts fail.
    pub async fn run(&self, generator: &dyn ArticleGenerator) -> Result<GeneratedArticle> {
        match generator.generate_article(&self.primary).await {
            Ok(article) => Ok(article),
            Err(e) => {
                warn!(
                    error = %e,
                    length = self.primary.length,
                    retry_length = self.fallback.length,
                    "generation failed, retrying shorter"
                );
                let article = generator.generate_article(&self.fallback).await?;
                info!(length = self.fallback.length, "retry succeeded");
                Ok(article)
            }
        }
    }
}

//! Claude-backed topic strategist and article generator.
//!
//! Both collaborators send a single prompt through [`AnthropicClient`] and
//! parse the tagged plain-text response (see [`parser`]).

mod client;
pub mod parser;
mod prompt;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use autopress_markdown::{EXCERPT_CHARS, excerpt, tidy_article};
use autopress_shared::{
    ArticleGenerator, AutopressError, CmsAnalysis, GeneratedArticle, GenerationRequest,
    PastAnalysis, Result, Site, TopicStrategist, TopicSuggestion,
};

pub use client::AnthropicClient;
pub use prompt::{article_prompt, strategy_prompt};

/// Sampling temperature for topic proposals.
const STRATEGY_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for article bodies.
const ARTICLE_TEMPERATURE: f32 = 0.7;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// [`ArticleGenerator`] backed by the Claude messages API.
#[derive(Debug, Clone)]
pub struct ClaudeGenerator {
    client: AnthropicClient,
}

impl ClaudeGenerator {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArticleGenerator for ClaudeGenerator {
    #[instrument(skip_all, fields(topic = %request.topic, length = request.length))]
    async fn generate_article(&self, request: &GenerationRequest) -> Result<GeneratedArticle> {
        let text = self
            .client
            .complete(&article_prompt(request), ARTICLE_TEMPERATURE)
            .await?;
        let parsed = parser::parse_article(&text);

        if parsed.content.is_empty() {
            return Err(AutopressError::Generation(
                "response is missing the <content> section".into(),
            ));
        }

        let title = if parsed.title.is_empty() {
            warn!("response is missing <title>, using the topic");
            request.topic.clone()
        } else {
            parsed.title
        };
        let content = tidy_article(&parsed.content, &title);

        info!(
            title = %title,
            chars = content.chars().count(),
            tags = parsed.tags.len(),
            "article generated"
        );

        Ok(GeneratedArticle {
            excerpt: excerpt(&content, EXCERPT_CHARS),
            title,
            content,
            tags: parsed.tags,
            description: parsed.description,
            model: Some(self.client.model().to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Strategist
// ---------------------------------------------------------------------------

/// [`TopicStrategist`] backed by the Claude messages API.
#[derive(Debug, Clone)]
pub struct ClaudeStrategist {
    client: AnthropicClient,
}

impl ClaudeStrategist {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopicStrategist for ClaudeStrategist {
    #[instrument(skip_all, fields(site = %site.id, past = past.total_articles))]
    async fn generate_content_strategy(
        &self,
        site: &Site,
        past: &PastAnalysis,
        cms: Option<&CmsAnalysis>,
    ) -> Result<Vec<TopicSuggestion>> {
        let text = self
            .client
            .complete(&strategy_prompt(site, past, cms), STRATEGY_TEMPERATURE)
            .await?;
        let suggestions = parser::parse_strategy(&text);
        info!(count = suggestions.len(), "topic suggestions received");
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use autopress_shared::{ImageSettings, OperatingWindow};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site() -> Site {
        Site {
            id: "side".into(),
            name: "副業ラボ".into(),
            url: "https://side.example.com".into(),
            genre: "副業".into(),
            target_audience: "会社員".into(),
            keywords_focus: vec!["副業".into()],
            daily_quota: 5,
            min_interval: Duration::from_secs(0),
            operating_hours: OperatingWindow { start: 0, end: 0 },
            auto_publish: true,
            require_approval: false,
            article_length: 7000,
            tone: String::new(),
            image: ImageSettings::default(),
            credentials: None,
            enabled: true,
        }
    }

    async fn mock_reply(server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": text}]
            })))
            .mount(server)
            .await;
    }

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("k", "claude-test", 1000)
            .unwrap()
            .with_base_url(&server.uri())
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            topic: "ブログ副業の始め方".into(),
            keywords: vec!["ブログ".into()],
            length: 7000,
            tone: String::new(),
            genre: "副業".into(),
            target_audience: "会社員".into(),
        }
    }

    #[tokio::test]
    async fn generator_parses_and_tidies_article() {
        let server = MockServer::start().await;
        let text = std::fs::read_to_string("../../../fixtures/llm/article_response.txt").unwrap();
        mock_reply(&server, &text).await;

        let article = ClaudeGenerator::new(client(&server))
            .generate_article(&request())
            .await
            .expect("generate");

        assert_eq!(article.title, "初心者でも月5万円！ブログ副業の始め方完全ガイド");
        assert!(article.content.starts_with("## はじめに"));
        assert!(!article.content.contains("\n\n\n"));
        assert!(article.excerpt.ends_with("..."));
        assert!(!article.excerpt.contains("**"));
        assert_eq!(article.tags.len(), 5);
        assert_eq!(article.model.as_deref(), Some("claude-test"));
    }

    #[tokio::test]
    async fn generator_rejects_response_without_content() {
        let server = MockServer::start().await;
        mock_reply(&server, "<title>only a title</title>").await;

        let err = ClaudeGenerator::new(client(&server))
            .generate_article(&request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("<content>"));
    }

    #[tokio::test]
    async fn strategist_returns_titled_suggestions() {
        let server = MockServer::start().await;
        let text = std::fs::read_to_string("../../../fixtures/llm/strategy_response.txt").unwrap();
        mock_reply(&server, &text).await;

        let suggestions = ClaudeStrategist::new(client(&server))
            .generate_content_strategy(&site(), &PastAnalysis::default(), None)
            .await
            .expect("strategy");
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[1].keywords, vec!["確定申告", "税金"]);
    }
}

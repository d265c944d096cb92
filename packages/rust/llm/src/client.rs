//! Minimal Anthropic messages API client.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use autopress_shared::{AnthropicConfig, AutopressError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Article generation can take minutes for long bodies.
const REQUEST_TIMEOUT_SECS: u64 = 300;

const USER_AGENT: &str = concat!("Autopress/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Anthropic API handle shared by the generator and the strategist.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Build a client with an explicit key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AutopressError::http_client)?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            model: model.into(),
            max_tokens,
        })
    }

    /// Build a client from `[anthropic]`, reading the key from its env var.
    pub fn from_config(config: &AnthropicConfig) -> Result<Self> {
        let key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AutopressError::config(format!("{} is not set", config.api_key_env))
            })?;
        Ok(Self::new(key, &config.model, config.max_tokens)?.with_base_url(&config.base_url))
    }

    /// Point the client at another host (tests, proxies).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Model used for every request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AutopressError::config("API key contains invalid characters"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a single user message and return the concatenated text blocks.
    pub async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Claude request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("Claude request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutopressError::Generation(format!(
                "Claude API error ({status}): {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AutopressError::parse(format!("invalid Claude response: {e}")))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(AutopressError::Generation("Claude returned no text".into()));
        }
        debug!(response_chars = text.chars().count(), "Claude response");
        Ok(text)
    }
}

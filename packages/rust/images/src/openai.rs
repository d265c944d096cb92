//! OpenAI image generation (`gpt-image-1`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use autopress_shared::{AutopressError, ImageGenerator, Result};

use crate::{REQUEST_TIMEOUT_SECS, USER_AGENT, save_image};

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    b64_json: Option<String>,
}

/// `gpt_image` generator.
#[derive(Debug, Clone)]
pub struct OpenAiImages {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    output_dir: PathBuf,
}

impl OpenAiImages {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        output_dir: &Path,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AutopressError::http_client)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            output_dir: output_dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImages {
    fn name(&self) -> &str {
        "gpt_image"
    }

    async fn generate(&self, prompt: &str, size: &str) -> Result<Option<PathBuf>> {
        let response = self
            .http
            .post(format!("{}/v1/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "size": size,
                "n": 1,
            }))
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("OpenAI image request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutopressError::Generation(format!(
                "OpenAI image API error ({status}): {body}"
            )));
        }

        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|e| AutopressError::parse(format!("OpenAI image response: {e}")))?;

        let Some(encoded) = body.data.into_iter().find_map(|d| d.b64_json) else {
            warn!("OpenAI image response carried no image data");
            return Ok(None);
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| AutopressError::parse(format!("invalid base64 image: {e}")))?;

        let path = save_image(&self.output_dir, self.name(), prompt, "png", &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "image generated");
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn decodes_and_saves_b64_image() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"fake-png");
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1,
                "data": [{"b64_json": encoded}]
            })))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("ap_img_{}", Uuid::now_v7()));
        let images = OpenAiImages::new("sk-test", "gpt-image-1", &server.uri(), &dir).unwrap();
        let path = images
            .generate("a laptop", "1536x1024")
            .await
            .unwrap()
            .expect("image path");
        assert!(path.starts_with(&dir));
        assert_eq!(std::fs::read(&path).unwrap(), b"fake-png");
    }

    #[tokio::test]
    async fn missing_data_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir();
        let images = OpenAiImages::new("k", "gpt-image-1", &server.uri(), &dir).unwrap();
        assert!(images.generate("x", "1024x1024").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("content_policy_violation"))
            .mount(&server)
            .await;

        let images =
            OpenAiImages::new("k", "gpt-image-1", &server.uri(), &std::env::temp_dir()).unwrap();
        let err = images.generate("x", "1024x1024").await.unwrap_err();
        assert!(err.to_string().contains("content_policy_violation"));
    }
}

//! Google Gemini image generation.

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
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// `gemini_image` generator.
#[derive(Debug, Clone)]
pub struct GeminiImages {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    output_dir: PathBuf,
}

impl GeminiImages {
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
impl ImageGenerator for GeminiImages {
    fn name(&self) -> &str {
        "gemini_image"
    }

    /// Gemini picks its own aspect ratio; `size` only goes into the prompt.
    async fn generate(&self, prompt: &str, size: &str) -> Result<Option<PathBuf>> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let text = format!("{prompt}, landscape {size}");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": text }] }],
                "generationConfig": {
                    "temperature": 0.7,
                    "responseModalities": ["TEXT", "IMAGE"]
                }
            }))
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("Gemini request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutopressError::Generation(format!(
                "Gemini API error ({status}): {body}"
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AutopressError::parse(format!("Gemini response: {e}")))?;

        let inline = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data);
        let Some(inline) = inline else {
            warn!("Gemini response carried no inline image");
            return Ok(None);
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| AutopressError::parse(format!("invalid base64 image: {e}")))?;
        let ext = extension_for(&inline.mime_type);
        let path = save_image(&self.output_dir, self.name(), prompt, ext, &bytes).await?;
        info!(path = %path.display(), mime = %inline.mime_type, "image generated");
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
    async fn saves_inline_data() {
        let server = MockServer::start().await;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"jpeg-bytes");
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here is your image"},
                            {"inlineData": {"mimeType": "image/jpeg", "data": encoded}}
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let dir = std::env::temp_dir().join(format!("ap_img_{}", Uuid::now_v7()));
        let gemini = GeminiImages::new("g-key", "gemini-test", &server.uri(), &dir).unwrap();
        let path = gemini.generate("a desk", "1536x1024").await.unwrap().unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn text_only_response_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "sorry"}]}}]
            })))
            .mount(&server)
            .await;

        let gemini =
            GeminiImages::new("k", "gemini-test", &server.uri(), &std::env::temp_dir()).unwrap();
        assert!(gemini.generate("x", "1024x1024").await.unwrap().is_none());
    }
}

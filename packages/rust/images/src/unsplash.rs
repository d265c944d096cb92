//! Unsplash stock photo search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use autopress_shared::{AutopressError, Result, StockPhoto, StockPhotoService, UnsplashConfig};

use crate::{REQUEST_TIMEOUT_SECS, USER_AGENT};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    urls: PhotoUrls,
    #[serde(default)]
    alt_description: Option<String>,
    #[serde(default)]
    description: Option<String>,
    user: PhotoUser,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Deserialize)]
struct PhotoUser {
    name: String,
}

/// Unsplash API client.
#[derive(Debug, Clone)]
pub struct Unsplash {
    http: Client,
    access_key: String,
    base_url: String,
}

impl Unsplash {
    pub fn new(access_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AutopressError::http_client)?;
        Ok(Self {
            http,
            access_key: access_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build from `[unsplash]`; `None` when the access key env var is unset.
    pub fn from_config(config: &UnsplashConfig) -> Result<Option<Self>> {
        match std::env::var(&config.access_key_env) {
            Ok(key) if !key.is_empty() => Ok(Some(Self::new(key, &config.base_url)?)),
            _ => Ok(None),
        }
    }

    fn auth(&self) -> String {
        format!("Client-ID {}", self.access_key)
    }
}

#[async_trait]
impl StockPhotoService for Unsplash {
    async fn search(&self, query: &str) -> Result<Vec<StockPhoto>> {
        let response = self
            .http
            .get(format!("{}/search/photos", self.base_url))
            .header("Authorization", self.auth())
            .query(&[
                ("query", query),
                ("per_page", "10"),
                ("orientation", "landscape"),
                ("order_by", "relevant"),
            ])
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("Unsplash search: {e}")))?;

        if !response.status().is_success() {
            return Err(AutopressError::Network(format!(
                "Unsplash search failed ({})",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AutopressError::parse(format!("Unsplash search: {e}")))?;
        debug!(query, hits = body.results.len(), "Unsplash search");

        Ok(body
            .results
            .into_iter()
            .map(|photo| StockPhoto {
                alt_text: photo
                    .alt_description
                    .or(photo.description)
                    .unwrap_or_else(|| query.to_string()),
                id: photo.id,
                url: photo.urls.regular,
                photographer: photo.user.name,
            })
            .collect())
    }

    async fn acknowledge_download(&self, photo_id: &str) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/photos/{photo_id}/download", self.base_url))
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("Unsplash download ack: {e}")))?;
        if !response.status().is_success() {
            return Err(AutopressError::Network(format!(
                "Unsplash download ack failed ({})",
                response.status()
            )));
        }
        Ok(())
    }
}

//! WordPress REST API publisher.
//!
//! Talks to `{site}/wp-json/wp/v2` with HTTP basic auth using an application
//! password. Implements [`ContentPublisher`] for one site and
//! [`PublisherFactory`] for building one per configured site.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use url::Url;

use autopress_markdown::{html_to_markdown, plain_text, to_html, truncate_chars};
use autopress_shared::{
    AutopressError, Category, CategoryId, CmsCredentials, CmsPost, ContentPublisher, MediaSource,
    PostDraft, PublishedPost, PublisherFactory, Result, Site,
};

/// CMS calls are short; anything slower is treated as a failure.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Image downloads and uploads get more room.
const MEDIA_TIMEOUT_SECS: u64 = 60;

/// Characters of each post body kept for strategy analysis.
const CONTENT_SAMPLE_CHARS: usize = 500;

const USER_AGENT: &str = concat!("Autopress/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct WpTerm {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WpPost {
    id: u64,
    #[serde(default)]
    link: String,
    title: Rendered,
    #[serde(default)]
    content: Option<Rendered>,
    #[serde(default)]
    categories: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct WpMedia {
    id: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A WordPress site reachable through its REST API.
#[derive(Debug, Clone)]
pub struct WordPressClient {
    http: Client,
    api_base: String,
    credentials: CmsCredentials,
}

impl WordPressClient {
    /// Build a client for `site_url` (e.g. `https://blog.example.com`).
    pub fn new(site_url: &str, credentials: CmsCredentials) -> Result<Self> {
        let parsed = Url::parse(site_url)
            .map_err(|e| AutopressError::config(format!("invalid site URL '{site_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AutopressError::config(format!(
                "site URL '{site_url}' must be http or https"
            )));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AutopressError::http_client)?;

        Ok(Self {
            http,
            api_base: format!("{}/wp-json/wp/v2", site_url.trim_end_matches('/')),
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_base)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.credentials.username, Some(&self.credentials.app_password))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| AutopressError::Network(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutopressError::Publish(format!(
                "{what} failed ({status}): {}",
                truncate_chars(&body, 300)
            )));
        }
        Ok(response)
    }

    async fn json<T: serde::de::DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| AutopressError::parse(format!("{what}: invalid JSON: {e}")))
    }

    /// Resolve a tag name to its id, creating the tag when no exact match exists.
    async fn tag_id(&self, name: &str) -> Result<u64> {
        let response = self
            .send(
                self.http
                    .get(self.endpoint("tags"))
                    .query(&[("search", name), ("per_page", "100")]),
                "tag search",
            )
            .await?;
        let existing: Vec<WpTerm> = Self::json(response, "tag search").await?;
        if let Some(tag) = existing.iter().find(|t| plain_text(&t.name) == name) {
            return Ok(tag.id);
        }

        let response = self
            .send(
                self.http.post(self.endpoint("tags")).json(&json!({ "name": name })),
                "tag create",
            )
            .await?;
        let created: WpTerm = Self::json(response, "tag create").await?;
        debug!(tag = name, id = created.id, "created tag");
        Ok(created.id)
    }

    async fn media_bytes(&self, source: &MediaSource) -> Result<(Vec<u8>, String)> {
        match source {
            MediaSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| AutopressError::io(path, e))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "cover.png".into());
                Ok((bytes, filename))
            }
            MediaSource::Url { url, filename } => {
                let response = self
                    .http
                    .get(url)
                    .timeout(Duration::from_secs(MEDIA_TIMEOUT_SECS))
                    .send()
                    .await
                    .map_err(|e| AutopressError::Network(format!("image download: {e}")))?;
                if !response.status().is_success() {
                    return Err(AutopressError::Network(format!(
                        "image download failed ({})",
                        response.status()
                    )));
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| AutopressError::Network(format!("image download: {e}")))?;
                Ok((bytes.to_vec(), filename.clone()))
            }
        }
    }
}

/// MIME type from a file name's extension.
fn mime_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

#[async_trait]
impl ContentPublisher for WordPressClient {
    async fn test_connection(&self) -> Result<bool> {
        let primary = self
            .send(
                self.http.get(self.endpoint("categories")).query(&[("per_page", "1")]),
                "connection test",
            )
            .await;
        if primary.is_ok() {
            return Ok(true);
        }

        match self.send(self.http.get(self.endpoint("users/me")), "connection test").await {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(error = %e, "WordPress connection test failed");
                Ok(false)
            }
        }
    }

    async fn get_categories(&self) -> Result<Vec<Category>> {
        let response = self
            .send(
                self.http
                    .get(self.endpoint("categories"))
                    .query(&[("per_page", "100")]),
                "category list",
            )
            .await?;
        let terms: Vec<WpTerm> = Self::json(response, "category list").await?;
        Ok(terms
            .into_iter()
            .map(|t| Category {
                id: CategoryId(t.id),
                name: plain_text(&t.name),
            })
            .collect())
    }

    #[instrument(skip_all, fields(alt = alt_text))]
    async fn upload_media(&self, source: MediaSource, alt_text: &str) -> Result<u64> {
        let (bytes, filename) = self.media_bytes(&source).await?;
        let size = bytes.len();

        let response = self
            .send(
                self.http
                    .post(self.endpoint("media"))
                    .timeout(Duration::from_secs(MEDIA_TIMEOUT_SECS))
                    .header(CONTENT_TYPE, mime_for(&filename))
                    .header(
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    )
                    .body(bytes),
                "media upload",
            )
            .await?;
        let media: WpMedia = Self::json(response, "media upload").await?;
        info!(media_id = media.id, size, filename = %filename, "uploaded media");

        if !alt_text.is_empty() {
            let update = self
                .send(
                    self.http
                        .post(self.endpoint(&format!("media/{}", media.id)))
                        .json(&json!({ "alt_text": alt_text })),
                    "media alt text",
                )
                .await;
            if let Err(e) = update {
                warn!(media_id = media.id, error = %e, "failed to set alt text");
            }
        }
        Ok(media.id)
    }

    #[instrument(skip_all, fields(title = %draft.title))]
    async fn publish_post(&self, draft: &PostDraft) -> Result<PublishedPost> {
        let mut tag_ids = Vec::with_capacity(draft.tags.len());
        for name in draft.tags.iter().filter(|t| !t.trim().is_empty()) {
            match self.tag_id(name.trim()).await {
                Ok(id) if !tag_ids.contains(&id) => tag_ids.push(id),
                Ok(_) => {}
                Err(e) => warn!(tag = %name, error = %e, "skipping tag"),
            }
        }

        let mut body = json!({
            "title": draft.title,
            "content": to_html(&draft.content),
            "excerpt": draft.excerpt,
            "status": draft.status,
            "comment_status": "open",
            "ping_status": "open",
            "tags": tag_ids,
        });
        if let Some(category) = draft.category {
            body["categories"] = json!([category.0]);
        }
        if let Some(media) = draft.featured_media {
            body["featured_media"] = json!(media);
        }

        let response = self
            .send(self.http.post(self.endpoint("posts")).json(&body), "post publish")
            .await?;
        let post: WpPost = Self::json(response, "post publish").await?;
        info!(post_id = post.id, link = %post.link, "post published");

        Ok(PublishedPost {
            id: post.id,
            link: post.link,
        })
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<CmsPost>> {
        let per_page = limit.clamp(1, 100).to_string();
        let response = self
            .send(
                self.http
                    .get(self.endpoint("posts"))
                    .query(&[("per_page", per_page.as_str()), ("status", "publish")]),
                "recent posts",
            )
            .await?;
        let posts: Vec<WpPost> = Self::json(response, "recent posts").await?;

        Ok(posts
            .into_iter()
            .map(|p| {
                let html = p.content.map(|c| c.rendered).unwrap_or_default();
                let sample = html_to_markdown(&html).unwrap_or_else(|_| plain_text(&html));
                CmsPost {
                    id: p.id,
                    title: plain_text(&p.title.rendered),
                    category_ids: p.categories,
                    content_sample: truncate_chars(&sample, CONTENT_SAMPLE_CHARS),
                }
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds a [`WordPressClient`] for each site that has credentials.
#[derive(Debug, Clone, Default)]
pub struct WordPressFactory;

#[async_trait]
impl PublisherFactory for WordPressFactory {
    async fn connect(&self, site: &Site) -> Result<Option<Box<dyn ContentPublisher>>> {
        let Some(credentials) = site.credentials.clone() else {
            return Ok(None);
        };
        let client = WordPressClient::new(&site.url, credentials)?;
        Ok(Some(Box::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{basic_auth, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> CmsCredentials {
        CmsCredentials {
            username: "editor".into(),
            app_password: "abcd efgh".into(),
        }
    }

    fn client(server: &MockServer) -> WordPressClient {
        WordPressClient::new(&server.uri(), creds()).expect("client")
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/wordpress/{name}"))
            .expect("read fixture")
    }

    #[test]
    fn rejects_invalid_site_url() {
        assert!(WordPressClient::new("not a url", creds()).is_err());
        assert!(WordPressClient::new("ftp://example.com", creds()).is_err());
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for("cover.PNG"), "image/png");
        assert_eq!(mime_for("photo.jpg"), "image/jpeg");
        assert_eq!(mime_for("noext"), "image/jpeg");
    }

    #[tokio::test]
    async fn connection_falls_back_to_users_me() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/categories"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/users/me"))
            .and(basic_auth("editor", "abcd efgh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).test_connection().await.unwrap());
    }

    #[tokio::test]
    async fn connection_failure_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(!client(&server).test_connection().await.unwrap());
    }

    #[tokio::test]
    async fn categories_decode_entities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/categories"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("categories.json")))
            .mount(&server)
            .await;

        let categories = client(&server).get_categories().await.unwrap();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[2].id, CategoryId(7));
        assert_eq!(categories[2].name, "副業の税金&確定申告");
    }

    #[tokio::test]
    async fn publish_resolves_tags_and_renders_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/tags"))
            .and(query_param("search", "副業"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": 11, "name": "副業"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/tags"))
            .and(query_param("search", "在宅"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/tags"))
            .and(body_partial_json(json!({"name": "在宅"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"id": 12, "name": "在宅"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(body_partial_json(json!({
                "title": "在宅副業ガイド",
                "content": "<h2>はじめに</h2>\n",
                "status": "publish",
                "tags": [11, 12],
                "categories": [3],
                "featured_media": 55
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 200,
                "link": "https://side.example.com/?p=200",
                "title": {"rendered": "在宅副業ガイド"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = PostDraft {
            title: "在宅副業ガイド".into(),
            content: "## はじめに".into(),
            excerpt: "抜粋".into(),
            tags: vec!["副業".into(), "在宅".into()],
            category: Some(CategoryId(3)),
            featured_media: Some(55),
            status: "publish".into(),
        };
        let post = client(&server).publish_post(&draft).await.expect("publish");
        assert_eq!(post.id, 200);
        assert_eq!(post.link, "https://side.example.com/?p=200");
    }

    #[tokio::test]
    async fn publish_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(403).set_body_string("rest_cannot_create"))
            .mount(&server)
            .await;

        let draft = PostDraft {
            title: "t".into(),
            content: "c".into(),
            excerpt: String::new(),
            tags: vec![],
            category: None,
            featured_media: None,
            status: "publish".into(),
        };
        let err = client(&server).publish_post(&draft).await.unwrap_err();
        assert!(matches!(err, AutopressError::Publish(_)));
        assert!(err.to_string().contains("rest_cannot_create"));
    }

    #[tokio::test]
    async fn upload_file_sets_alt_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 77})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media/77"))
            .and(body_partial_json(json!({"alt_text": "ノートパソコン"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77})))
            .expect(1)
            .mount(&server)
            .await;

        let file = std::env::temp_dir().join(format!("ap_media_{}.png", Uuid::now_v7()));
        std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();

        let id = client(&server)
            .upload_media(MediaSource::File(file), "ノートパソコン")
            .await
            .expect("upload");
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn upload_from_url_downloads_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/abc.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/media"))
            .and(header("content-type", "image/jpeg"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 78})))
            .mount(&server)
            .await;

        let source = MediaSource::Url {
            url: format!("{}/photos/abc.jpg", server.uri()),
            filename: "unsplash_abc.jpg".into(),
        };
        let id = client(&server).upload_media(source, "").await.unwrap();
        assert_eq!(id, 78);
    }

    #[tokio::test]
    async fn recent_posts_sample_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("per_page", "50"))
            .and(query_param("status", "publish"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("posts.json")))
            .mount(&server)
            .await;

        let posts = client(&server).recent_posts(50).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].title, "在宅ワーク\u{2013}はじめの一歩");
        assert_eq!(posts[1].title, "副業の税金 & 確定申告");
        assert_eq!(posts[0].category_ids, vec![3, 5]);
        assert!(posts[0].content_sample.contains("## はじめに"));
        assert!(posts[0].content_sample.contains("通勤時間ゼロ"));
    }

    #[tokio::test]
    async fn factory_without_credentials_yields_none() {
        let site = Site {
            id: "s".into(),
            name: "s".into(),
            url: "https://s.example.com".into(),
            genre: String::new(),
            target_audience: String::new(),
            keywords_focus: vec![],
            daily_quota: 1,
            min_interval: Duration::from_secs(0),
            operating_hours: autopress_shared::OperatingWindow { start: 0, end: 0 },
            auto_publish: true,
            require_approval: false,
            article_length: 1000,
            tone: String::new(),
            image: autopress_shared::ImageSettings::default(),
            credentials: None,
            enabled: true,
        };
        assert!(WordPressFactory.connect(&site).await.unwrap().is_none());

        let with_creds = Site {
            credentials: Some(creds()),
            ..site
        };
        assert!(WordPressFactory.connect(&with_creds).await.unwrap().is_some());
    }
}

//! Cover image resolution: generative service first, stock photo second.
//!
//! Every step is best-effort. Failures are logged and degrade to "no cover
//! image"; they never abort a publish.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use autopress_images::image_prompt;
use autopress_shared::{
    ContentPublisher, ImageGenerator, ImageService, MediaSource, Site, StockPhoto,
    StockPhotoService,
};

/// Japanese domain terms and the English stock-photo queries they map to.
const QUERY_MAP: &[(&str, &str)] = &[
    ("副業", "side business laptop"),
    ("ブログ", "blogging writing"),
    ("AI", "artificial intelligence technology"),
    ("稼ぐ", "earning money"),
    ("初心者", "beginner learning"),
    ("アフィリエイト", "affiliate marketing"),
    ("在宅", "work from home"),
    ("ネット", "internet online"),
];

/// Title words worth turning into a stock-photo query.
const IMPORTANT_WORDS: &[&str] = &[
    "副業",
    "ブログ",
    "AI",
    "稼ぐ",
    "初心者",
    "アフィリエイト",
    "在宅",
    "ネット",
    "収入",
    "ビジネス",
    "マーケティング",
    "SEO",
];

/// Query for any term missing from [`QUERY_MAP`].
const GENERIC_QUERY: &str = "business";

/// Query tried after everything else.
pub const FALLBACK_QUERY: &str = "business technology";

/// How long a stock photo stays off-limits for the site that used it.
pub const STOCK_HISTORY_DAYS: i64 = 30;

/// Ordered, de-duplicated stock-photo queries for an article.
///
/// Up to three tags and two important title words are mapped to English;
/// [`FALLBACK_QUERY`] always comes last.
pub fn stock_queries(title: &str, tags: &[String]) -> Vec<String> {
    let title_words = IMPORTANT_WORDS.iter().filter(|w| title.contains(*w)).take(2);
    let terms = tags.iter().take(3).map(String::as_str).chain(title_words.copied());

    let mut queries: Vec<String> = Vec::new();
    for term in terms {
        let query = QUERY_MAP
            .iter()
            .find(|(jp, _)| *jp == term)
            .map(|(_, en)| *en)
            .unwrap_or(GENERIC_QUERY);
        if !queries.iter().any(|q| q == query) {
            queries.push(query.to_string());
        }
    }
    if !queries.iter().any(|q| q == FALLBACK_QUERY) {
        queries.push(FALLBACK_QUERY.to_string());
    }
    queries
}

/// An uploaded cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub media_id: u64,
    /// Stock photo id when the cover came from the stock service.
    pub stock_photo: Option<String>,
}

/// The image services available to the cycle.
#[derive(Default)]
pub struct CoverImages {
    generators: Vec<Box<dyn ImageGenerator>>,
    stock: Option<Box<dyn StockPhotoService>>,
}

impl CoverImages {
    pub fn new(
        generators: Vec<Box<dyn ImageGenerator>>,
        stock: Option<Box<dyn StockPhotoService>>,
    ) -> Self {
        Self { generators, stock }
    }

    /// No image services at all.
    pub fn none() -> Self {
        Self::default()
    }

    fn generator_for(&self, service: ImageService) -> Option<&dyn ImageGenerator> {
        let found = match service.generator_preference() {
            Some(name) => self.generators.iter().find(|g| g.name() == name),
            None => self.generators.first(),
        };
        found.map(|g| &**g)
    }

    /// Upload a cover image for the article.
    ///
    /// Stock photos in `recently_used` are passed over while any other hit
    /// exists.
    pub async fn resolve(
        &self,
        site: &Site,
        title: &str,
        tags: &[String],
        publisher: &dyn ContentPublisher,
        recently_used: &HashSet<String>,
    ) -> Option<CoverImage> {
        let service = site.image.service;
        if service == ImageService::None {
            debug!(site = %site.id, "cover images disabled");
            return None;
        }

        if service.is_generative() {
            if let Some(media_id) = self.generated(site, title, tags, publisher).await {
                return Some(CoverImage {
                    media_id,
                    stock_photo: None,
                });
            }
        }
        self.from_stock(title, tags, publisher, recently_used).await
    }

    async fn generated(
        &self,
        site: &Site,
        title: &str,
        tags: &[String],
        publisher: &dyn ContentPublisher,
    ) -> Option<u64> {
        let Some(generator) = self.generator_for(site.image.service) else {
            debug!(service = ?site.image.service, "no matching image generator configured");
            return None;
        };

        let prompt = image_prompt(title, tags, &site.genre, &site.image);
        let path = match generator.generate(&prompt, &site.image.size).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                warn!(generator = generator.name(), "image generator returned nothing");
                return None;
            }
            Err(e) => {
                warn!(generator = generator.name(), error = %e, "image generation failed");
                return None;
            }
        };

        match publisher.upload_media(MediaSource::File(path), title).await {
            Ok(media_id) => {
                info!(generator = generator.name(), media_id, "generated cover image uploaded");
                Some(media_id)
            }
            Err(e) => {
                warn!(error = %e, "generated image upload failed");
                None
            }
        }
    }

    async fn from_stock(
        &self,
        title: &str,
        tags: &[String],
        publisher: &dyn ContentPublisher,
        recently_used: &HashSet<String>,
    ) -> Option<CoverImage> {
        let stock = self.stock.as_ref()?;
        let mut repeat: Option<(String, StockPhoto)> = None;

        for query in stock_queries(title, tags) {
            let mut hits = match stock.search(&query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "stock photo search failed");
                    continue;
                }
            };

            match hits.iter().position(|p| !recently_used.contains(&p.id)) {
                Some(i) => {
                    let photo = hits.swap_remove(i);
                    return self.upload_stock(&**stock, photo, &query, publisher).await;
                }
                None => {
                    if repeat.is_none() {
                        repeat = hits.into_iter().next().map(|p| (query, p));
                    }
                }
            }
        }

        if let Some((query, photo)) = repeat {
            debug!(photo = %photo.id, "every hit was used recently, repeating one");
            return self.upload_stock(&**stock, photo, &query, publisher).await;
        }
        warn!("no stock photo found");
        None
    }

    async fn upload_stock(
        &self,
        stock: &dyn StockPhotoService,
        photo: StockPhoto,
        query: &str,
        publisher: &dyn ContentPublisher,
    ) -> Option<CoverImage> {
        let source = MediaSource::Url {
            url: photo.url.clone(),
            filename: format!("unsplash_{}.jpg", photo.id),
        };
        match publisher.upload_media(source, &photo.alt_text).await {
            Ok(media_id) => {
                if let Err(e) = stock.acknowledge_download(&photo.id).await {
                    debug!(photo = %photo.id, error = %e, "download acknowledgment failed");
                }
                info!(query, photo = %photo.id, media_id, "stock cover image uploaded");
                Some(CoverImage {
                    media_id,
                    stock_photo: Some(photo.id),
                })
            }
            Err(e) => {
                warn!(photo = %photo.id, error = %e, "stock photo upload failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use autopress_shared::{
        AutopressError, Category, CmsPost, ImageSettings, OperatingWindow, PostDraft,
        PublishedPost, Result, StockPhoto,
    };

    use super::*;

    struct FakeGenerator {
        name: &'static str,
        result: Option<PathBuf>,
        fail: bool,
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _prompt: &str, _size: &str) -> Result<Option<PathBuf>> {
            if self.fail {
                return Err(AutopressError::Generation("quota".into()));
            }
            Ok(self.result.clone())
        }
    }

    /// Answers one query with a fixed list of photo ids.
    #[derive(Default)]
    struct FakeStock {
        hit_on: Option<&'static str>,
        ids: Vec<&'static str>,
        searches: Mutex<Vec<String>>,
        acks: Mutex<Vec<String>>,
    }

    impl FakeStock {
        fn answering(query: &'static str, ids: &[&'static str]) -> Self {
            Self {
                hit_on: Some(query),
                ids: ids.to_vec(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl StockPhotoService for FakeStock {
        async fn search(&self, query: &str) -> Result<Vec<StockPhoto>> {
            self.searches.lock().unwrap().push(query.to_string());
            if self.hit_on != Some(query) {
                return Ok(vec![]);
            }
            Ok(self
                .ids
                .iter()
                .map(|id| StockPhoto {
                    id: (*id).to_string(),
                    url: format!("https://images.example.com/{id}.jpg"),
                    alt_text: "desk".into(),
                    photographer: "Jane".into(),
                })
                .collect())
        }

        async fn acknowledge_download(&self, photo_id: &str) -> Result<()> {
            self.acks.lock().unwrap().push(photo_id.to_string());
            Err(AutopressError::Network("ack refused".into()))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        uploads: Mutex<Vec<MediaSource>>,
        fail_uploads: bool,
    }

    #[async_trait]
    impl ContentPublisher for RecordingPublisher {
        async fn test_connection(&self) -> Result<bool> {
            Ok(true)
        }
        async fn get_categories(&self) -> Result<Vec<Category>> {
            Ok(vec![])
        }
        async fn upload_media(&self, source: MediaSource, _alt_text: &str) -> Result<u64> {
            if self.fail_uploads {
                return Err(AutopressError::Publish("413".into()));
            }
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push(source);
            Ok(100 + uploads.len() as u64)
        }
        async fn publish_post(&self, _draft: &PostDraft) -> Result<PublishedPost> {
            Err(AutopressError::Publish("unused".into()))
        }
        async fn recent_posts(&self, _limit: usize) -> Result<Vec<CmsPost>> {
            Ok(vec![])
        }
    }

    fn site(service: ImageService) -> Site {
        Site {
            id: "s".into(),
            name: "S".into(),
            url: "https://example.com".into(),
            genre: "副業".into(),
            target_audience: String::new(),
            keywords_focus: vec![],
            daily_quota: 1,
            min_interval: std::time::Duration::ZERO,
            operating_hours: OperatingWindow { start: 0, end: 0 },
            auto_publish: true,
            require_approval: false,
            article_length: 7000,
            tone: String::new(),
            image: ImageSettings {
                service,
                ..ImageSettings::default()
            },
            credentials: None,
            enabled: true,
        }
    }

    fn generator(name: &'static str, fail: bool) -> Box<dyn ImageGenerator> {
        Box::new(FakeGenerator {
            name,
            result: Some(PathBuf::from(format!("/tmp/{name}.png"))),
            fail,
        })
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn queries_map_tags_then_title_words() {
        let queries = stock_queries("AIで稼ぐ副業", &tags(&["副業", "ガイド", "在宅", "ネット"]));
        assert_eq!(
            queries,
            vec![
                "side business laptop",
                "business",
                "work from home",
                "artificial intelligence technology",
                "business technology",
            ]
        );
    }

    #[test]
    fn queries_always_end_with_fallback() {
        assert_eq!(stock_queries("", &[]), vec![FALLBACK_QUERY]);
    }

    #[tokio::test]
    async fn none_service_skips_everything() {
        let images = CoverImages::new(vec![generator("gpt_image", false)], None);
        let publisher = RecordingPublisher::default();
        let media = images
            .resolve(&site(ImageService::None), "t", &[], &publisher, &HashSet::new())
            .await;
        assert_eq!(media, None);
        assert!(publisher.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auto_uses_first_generator() {
        let images = CoverImages::new(
            vec![generator("gpt_image", false), generator("gemini_image", false)],
            None,
        );
        let publisher = RecordingPublisher::default();
        let media = images
            .resolve(&site(ImageService::Auto), "t", &[], &publisher, &HashSet::new())
            .await;
        assert_eq!(
            media,
            Some(CoverImage {
                media_id: 101,
                stock_photo: None
            })
        );
        let uploads = publisher.uploads.lock().unwrap();
        assert!(matches!(&uploads[0], MediaSource::File(p) if p.ends_with("gpt_image.png")));
    }

    #[tokio::test]
    async fn named_generator_is_preferred() {
        let images = CoverImages::new(
            vec![generator("gpt_image", false), generator("gemini_image", false)],
            None,
        );
        let publisher = RecordingPublisher::default();
        images
            .resolve(&site(ImageService::GeminiImage), "t", &[], &publisher, &HashSet::new())
            .await;
        let uploads = publisher.uploads.lock().unwrap();
        assert!(matches!(&uploads[0], MediaSource::File(p) if p.ends_with("gemini_image.png")));
    }

    #[tokio::test]
    async fn generator_failure_falls_through_to_stock() {
        let stock = FakeStock::answering(FALLBACK_QUERY, &["p1"]);
        let images = CoverImages::new(vec![generator("gpt_image", true)], Some(Box::new(stock)));
        let publisher = RecordingPublisher::default();
        let media = images
            .resolve(
                &site(ImageService::Auto),
                "副業の話",
                &tags(&["副業"]),
                &publisher,
                &HashSet::new(),
            )
            .await;
        // Acknowledgment failure does not matter.
        assert_eq!(media.map(|c| c.media_id), Some(101));
        let uploads = publisher.uploads.lock().unwrap();
        assert!(matches!(
            &uploads[0],
            MediaSource::Url { filename, .. } if filename == "unsplash_p1.jpg"
        ));
    }

    #[tokio::test]
    async fn unsplash_setting_skips_generators() {
        let stock = FakeStock::answering("side business laptop", &["p1"]);
        let images = CoverImages::new(vec![generator("gpt_image", false)], Some(Box::new(stock)));
        let publisher = RecordingPublisher::default();
        let media = images
            .resolve(
                &site(ImageService::Unsplash),
                "t",
                &tags(&["副業"]),
                &publisher,
                &HashSet::new(),
            )
            .await;
        assert_eq!(media.and_then(|c| c.stock_photo).as_deref(), Some("p1"));
        assert!(matches!(&publisher.uploads.lock().unwrap()[0], MediaSource::Url { .. }));
    }

    #[tokio::test]
    async fn upload_failure_means_no_cover() {
        let images = CoverImages::new(vec![generator("gpt_image", false)], None);
        let publisher = RecordingPublisher {
            fail_uploads: true,
            ..RecordingPublisher::default()
        };
        let media = images
            .resolve(&site(ImageService::Auto), "t", &[], &publisher, &HashSet::new())
            .await;
        assert_eq!(media, None);
    }

    #[tokio::test]
    async fn recently_used_photos_are_passed_over() {
        let stock = FakeStock::answering("side business laptop", &["p1", "p2", "p3"]);
        let images = CoverImages::new(vec![], Some(Box::new(stock)));
        let publisher = RecordingPublisher::default();
        let site = site(ImageService::Unsplash);
        let tags = tags(&["副業"]);

        let mut used = HashSet::new();
        let first = images
            .resolve(&site, "副業入門", &tags, &publisher, &used)
            .await
            .expect("first cover");
        used.extend(first.stock_photo.clone());
        let second = images
            .resolve(&site, "副業のコツ", &tags, &publisher, &used)
            .await
            .expect("second cover");

        assert_eq!(first.stock_photo.as_deref(), Some("p1"));
        assert_eq!(second.stock_photo.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn photo_is_repeated_when_every_hit_was_used() {
        let stock = FakeStock::answering("side business laptop", &["p1"]);
        let images = CoverImages::new(vec![], Some(Box::new(stock)));
        let publisher = RecordingPublisher::default();
        let used = HashSet::from(["p1".to_string()]);

        let cover = images
            .resolve(
                &site(ImageService::Unsplash),
                "t",
                &tags(&["副業"]),
                &publisher,
                &used,
            )
            .await
            .expect("a cover");
        assert_eq!(cover.stock_photo.as_deref(), Some("p1"));
    }
}

//! One generation-and-maybe-publish attempt for one site.
//!
//! ```text
//! eligibility -> topic -> generate (retry once shorter) -> persist draft
//!             -> [auto-publish] category -> cover image -> publish
//! ```
//!
//! [`PublishingCycle::run`] never fails: every collaborator error becomes a
//! logged, counted [`CycleOutcome`].

use std::time::Duration;

use chrono::{Timelike, Utc};
use tracing::{error, info, instrument, warn};

use autopress_shared::{
    Article, ArticleGenerator, ArticleId, ContentPublisher, PublishedPost, PublisherFactory,
    Result, RunStatistics, Site, StatEvent, TopicStrategist,
};
use autopress_storage::Storage;

use crate::analysis::{cms_analysis, past_analysis};
use crate::category::CategorySelector;
use crate::image::CoverImages;
use crate::retry::GenerationPolicy;
use crate::schedule::{Clock, SkipReason, SystemClock, articles_on_day, skip_reason};
use crate::topic::{DUPLICATE_THRESHOLD, select_topic};
use crate::variation::angle_keywords;

/// Default pause between posts in [`PublishingCycle::publish_pending`].
const DEFAULT_PENDING_INTERVAL: Duration = Duration::from_secs(30);

/// Terminal state of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Not eligible this tick. Nothing was counted.
    Skipped(SkipReason),
    /// The strategist failed or proposed nothing.
    StrategyFailed,
    /// Both generation attempts failed.
    GenerationFailed,
    /// The article store could not be read or written.
    PersistFailed,
    /// Stored as a draft; auto-publish is off for the site.
    Drafted { article_id: ArticleId },
    /// Stored as a draft; publishing was attempted and failed.
    PublishFailed { article_id: ArticleId },
    Published {
        article_id: ArticleId,
        post: PublishedPost,
    },
}

impl CycleOutcome {
    /// Whether the cycle got past the eligibility check.
    pub fn did_work(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }

    /// Whether the outcome was counted as an error.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::StrategyFailed | Self::GenerationFailed | Self::PersistFailed | Self::PublishFailed { .. }
        )
    }
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::StrategyFailed => f.write_str("no topic from strategist"),
            Self::GenerationFailed => f.write_str("article generation failed"),
            Self::PersistFailed => f.write_str("article store unavailable"),
            Self::Drafted { article_id } => write!(f, "draft saved ({article_id})"),
            Self::PublishFailed { article_id } => {
                write!(f, "publish failed, kept as draft ({article_id})")
            }
            Self::Published { post, .. } => write!(f, "published: {}", post.link),
        }
    }
}

/// Progress callback for reporting cycle status.
pub trait CycleProgress: Send + Sync {
    /// Called before a site is processed.
    fn site_started(&self, site: &Site);
    /// Called when entering a new step.
    fn phase(&self, name: &str);
    /// Called with the site's terminal outcome.
    fn site_finished(&self, site: &Site, outcome: &CycleOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl CycleProgress for SilentProgress {
    fn site_started(&self, _site: &Site) {}
    fn phase(&self, _name: &str) {}
    fn site_finished(&self, _site: &Site, _outcome: &CycleOutcome) {}
}

/// The publishing control loop and the collaborators it composes.
pub struct PublishingCycle {
    pub(crate) storage: Storage,
    strategist: Box<dyn TopicStrategist>,
    generator: Box<dyn ArticleGenerator>,
    pub(crate) publishers: Box<dyn PublisherFactory>,
    pub(crate) images: CoverImages,
    pub(crate) selector: CategorySelector,
    duplicate_threshold: f64,
    pub(crate) pending_interval: Duration,
    pub(crate) clock: Box<dyn Clock>,
}

impl PublishingCycle {
    /// A cycle with no image services, the built-in keyword table and the
    /// system clock.
    pub fn new(
        storage: Storage,
        strategist: Box<dyn TopicStrategist>,
        generator: Box<dyn ArticleGenerator>,
        publishers: Box<dyn PublisherFactory>,
    ) -> Self {
        Self {
            storage,
            strategist,
            generator,
            publishers,
            images: CoverImages::none(),
            selector: CategorySelector::default(),
            duplicate_threshold: DUPLICATE_THRESHOLD,
            pending_interval: DEFAULT_PENDING_INTERVAL,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_images(mut self, images: CoverImages) -> Self {
        self.images = images;
        self
    }

    pub fn with_selector(mut self, selector: CategorySelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_duplicate_threshold(mut self, threshold: f64) -> Self {
        self.duplicate_threshold = threshold;
        self
    }

    pub fn with_pending_interval(mut self, interval: Duration) -> Self {
        self.pending_interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Reason the site would be skipped right now, or `None` when eligible.
    pub async fn check_eligibility(&self, site: &Site) -> Result<Option<SkipReason>> {
        let now = self.clock.now();
        let history = self.storage.site_articles(&site.id).await?;
        Ok(skip_reason(site, articles_on_day(&history, &now), now.hour()))
    }

    /// Run one cycle for `site`.
    #[instrument(skip_all, fields(site = %site.id))]
    pub async fn run(&self, site: &Site, progress: &dyn CycleProgress) -> CycleOutcome {
        progress.site_started(site);
        let outcome = self.run_steps(site, progress).await;
        if outcome.did_work() {
            self.touch().await;
        }
        info!(outcome = %outcome, "cycle finished");
        progress.site_finished(site, &outcome);
        outcome
    }

    async fn run_steps(&self, site: &Site, progress: &dyn CycleProgress) -> CycleOutcome {
        let now = self.clock.now();

        // --- Eligibility ---
        progress.phase("Checking eligibility");
        let history = match self.storage.site_articles(&site.id).await {
            Ok(history) => history,
            Err(e) => {
                error!(error = %e, "reading article history failed");
                self.record(StatEvent::Error).await;
                return CycleOutcome::PersistFailed;
            }
        };
        let today = articles_on_day(&history, &now);
        if let Some(reason) = skip_reason(site, today, now.hour()) {
            info!(%reason, "site skipped");
            return CycleOutcome::Skipped(reason);
        }

        // --- Topic ---
        progress.phase("Planning topic");
        let publisher = self.connect(site).await;
        let cms = match &publisher {
            Some(p) => cms_analysis(p.as_ref()).await,
            None => None,
        };
        let past = past_analysis(&history);
        let suggestions = match self
            .strategist
            .generate_content_strategy(site, &past, cms.as_ref())
            .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                error!(error = %e, "content strategy failed");
                Vec::new()
            }
        };
        let past_titles: Vec<String> = history.iter().map(|a| a.title.clone()).collect();
        let Some(topic) = select_topic(&suggestions, &past_titles, self.duplicate_threshold) else {
            warn!("strategist returned no topics");
            self.record(StatEvent::Error).await;
            return CycleOutcome::StrategyFailed;
        };
        info!(topic = %topic.title, "topic selected");

        // --- Generation ---
        progress.phase("Generating article");
        let policy = GenerationPolicy::for_topic(site, topic, angle_keywords(&topic.keywords, today));
        let generated = match policy.run(self.generator.as_ref()).await {
            Ok(generated) => generated,
            Err(e) => {
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    "article generation failed after retry"
                );
                self.record(StatEvent::Error).await;
                return CycleOutcome::GenerationFailed;
            }
        };

        // --- Persist ---
        progress.phase("Saving draft");
        let mut article = Article::draft(
            site.id.as_str(),
            generated,
            Some(topic.clone()),
            now.with_timezone(&Utc),
        );
        if let Err(e) = self.storage.insert_article(&article).await {
            error!(error = %e, "saving draft failed");
            self.record(StatEvent::Error).await;
            return CycleOutcome::PersistFailed;
        }
        self.record(StatEvent::Generated).await;
        info!(article = %article.id, title = %article.title, "draft saved");

        let article_id = article.id.clone();
        if !site.publishes_automatically() {
            return CycleOutcome::Drafted { article_id };
        }
        let Some(publisher) = publisher else {
            warn!("site has credentials but no publisher could be built");
            self.record(StatEvent::Error).await;
            return CycleOutcome::PublishFailed { article_id };
        };

        // --- Publish ---
        match self
            .publish_article(site, &mut article, publisher.as_ref(), progress)
            .await
        {
            Ok(post) => {
                self.record(StatEvent::Published).await;
                CycleOutcome::Published { article_id, post }
            }
            Err(e) => {
                error!(
                    error = %e,
                    transient = e.is_transient(),
                    article = %article_id,
                    "publish failed, article kept as draft"
                );
                self.record(StatEvent::Error).await;
                CycleOutcome::PublishFailed { article_id }
            }
        }
    }

    /// Build the site's publisher; errors are logged and treated as absent.
    pub(crate) async fn connect(&self, site: &Site) -> Option<Box<dyn ContentPublisher>> {
        match self.publishers.connect(site).await {
            Ok(publisher) => publisher,
            Err(e) => {
                warn!(site = %site.id, error = %e, "could not build CMS publisher");
                None
            }
        }
    }

    /// Count one event in the persisted run statistics.
    pub(crate) async fn record(&self, event: StatEvent) {
        self.update_stats(|stats| stats.record(event)).await;
    }

    /// Stamp `last_run`.
    pub(crate) async fn touch(&self) {
        let at = self.clock.now().with_timezone(&Utc);
        self.update_stats(|stats| stats.touch(at)).await;
    }

    async fn update_stats(&self, apply: impl FnOnce(&mut RunStatistics)) {
        let mut stats = match self.storage.load_run_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "loading run statistics failed");
                return;
            }
        };
        apply(&mut stats);
        if let Err(e) = self.storage.save_run_stats(&stats).await {
            warn!(error = %e, "saving run statistics failed");
        }
    }
}

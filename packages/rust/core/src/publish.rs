//! The publish step shared by the cycle and `publish-pending`.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use tracing::{error, info, instrument, warn};

use autopress_shared::{
    Article, AutopressError, ContentPublisher, PostDraft, PublishedPost, Result, Site, StatEvent,
};

use crate::cycle::{CycleProgress, PublishingCycle};
use crate::image::STOCK_HISTORY_DAYS;

/// WordPress post status for immediate publication.
const PUBLISH_STATUS: &str = "publish";

/// Tally of a [`PublishingCycle::publish_pending`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingReport {
    pub published: usize,
    pub failed: usize,
    /// Drafts whose site has no credentials.
    pub skipped: usize,
    /// Drafts whose site is gone from the config; marked `error`.
    pub orphaned: usize,
}

impl PublishingCycle {
    /// Select a category, resolve a cover image, publish, then mark the
    /// article published in the store.
    ///
    /// A failing connection test or `publish_post` is an error and leaves
    /// the article a draft. Category and image lookups degrade silently.
    pub(crate) async fn publish_article(
        &self,
        site: &Site,
        article: &mut Article,
        publisher: &dyn ContentPublisher,
        progress: &dyn CycleProgress,
    ) -> Result<PublishedPost> {
        progress.phase("Connecting to CMS");
        if !publisher.test_connection().await? {
            return Err(AutopressError::Publish(format!(
                "connection test failed for {}",
                site.url
            )));
        }

        progress.phase("Selecting category");
        let categories = publisher.get_categories().await.unwrap_or_else(|e| {
            warn!(error = %e, "fetching categories failed, publishing uncategorized");
            Vec::new()
        });
        let category =
            self.selector
                .select(&article.title, &article.content, &article.tags, &categories);

        progress.phase("Resolving cover image");
        let now = self.clock.now().with_timezone(&Utc);
        let recently_used = self
            .storage
            .used_image_ids(&site.id, now - Duration::days(STOCK_HISTORY_DAYS))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "reading stock photo history failed");
                HashSet::new()
            });
        let cover = self
            .images
            .resolve(site, &article.title, &article.tags, publisher, &recently_used)
            .await;
        let featured_media = cover.as_ref().map(|c| c.media_id);

        progress.phase("Publishing");
        let draft = PostDraft {
            title: article.title.clone(),
            content: article.content.clone(),
            excerpt: article.excerpt.clone(),
            tags: article.tags.clone(),
            category,
            featured_media,
            status: PUBLISH_STATUS.to_string(),
        };
        let post = publisher.publish_post(&draft).await?;
        info!(post_id = post.id, url = %post.link, ?category, ?featured_media, "post published");

        if let Some(photo_id) = cover.and_then(|c| c.stock_photo) {
            if let Err(e) = self.storage.record_used_image(&site.id, &photo_id, now).await {
                warn!(photo = %photo_id, error = %e, "recording stock photo use failed");
            }
        }

        article.mark_published(&post, now)?;
        if let Err(e) = self.storage.update_article(article).await {
            error!(article = %article.id, error = %e, "post is live but the stored article was not updated");
        }
        Ok(post)
    }

    /// Publish every stored draft, oldest first.
    ///
    /// Waits the pending interval between consecutive posts. Drafts of sites
    /// missing from `sites` become `error`.
    #[instrument(skip_all, fields(sites = sites.len()))]
    pub async fn publish_pending(
        &self,
        sites: &[Site],
        progress: &dyn CycleProgress,
    ) -> Result<PendingReport> {
        let drafts = self.storage.pending_drafts().await?;
        info!(drafts = drafts.len(), "publishing pending drafts");

        let mut report = PendingReport::default();
        let mut posted_any = false;

        for mut article in drafts {
            let Some(site) = sites.iter().find(|s| s.id == article.site_id) else {
                warn!(article = %article.id, site = %article.site_id, "draft belongs to an unknown site");
                article.mark_error()?;
                self.storage.update_article(&article).await?;
                report.orphaned += 1;
                continue;
            };
            let Some(publisher) = self.connect(site).await else {
                report.skipped += 1;
                continue;
            };

            if posted_any && !self.pending_interval.is_zero() {
                tokio::time::sleep(self.pending_interval).await;
            }

            match self
                .publish_article(site, &mut article, publisher.as_ref(), progress)
                .await
            {
                Ok(_) => {
                    self.record(StatEvent::Published).await;
                    report.published += 1;
                    posted_any = true;
                }
                Err(e) => {
                    error!(article = %article.id, error = %e, "publishing draft failed");
                    self.record(StatEvent::Error).await;
                    report.failed += 1;
                }
            }
        }

        if report.published + report.failed > 0 {
            self.touch().await;
        }
        info!(?report, "pending drafts processed");
        Ok(report)
    }
}

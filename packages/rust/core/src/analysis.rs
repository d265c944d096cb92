//! Strategist inputs: stored history and what is already on the CMS.

use std::collections::BTreeMap;

use tracing::debug;

use autopress_shared::{Article, ArticleStatus, CmsAnalysis, ContentPublisher, PastAnalysis};

/// Posts fetched from the CMS for the strategist.
pub const CMS_SAMPLE_SIZE: usize = 50;

/// Summarise a site's published articles. `articles` may be in any order.
pub fn past_analysis(articles: &[Article]) -> PastAnalysis {
    let mut published: Vec<&Article> = articles
        .iter()
        .filter(|a| a.status == ArticleStatus::Published)
        .collect();
    published.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut keyword_frequency = BTreeMap::new();
    for article in &published {
        for tag in &article.tags {
            *keyword_frequency.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    PastAnalysis {
        total_articles: published.len(),
        titles: published.iter().map(|a| a.title.clone()).collect(),
        keyword_frequency,
        newest_article_date: published.first().map(|a| a.created_at),
        oldest_article_date: published.last().map(|a| a.created_at),
    }
}

/// Summarise recent CMS posts. Any failure yields `None`.
pub async fn cms_analysis(publisher: &dyn ContentPublisher) -> Option<CmsAnalysis> {
    match publisher.test_connection().await {
        Ok(true) => {}
        Ok(false) => {
            debug!("CMS connection test failed, skipping CMS analysis");
            return None;
        }
        Err(e) => {
            debug!(error = %e, "CMS connection test errored, skipping CMS analysis");
            return None;
        }
    }

    match publisher.recent_posts(CMS_SAMPLE_SIZE).await {
        Ok(posts) => {
            debug!(posts = posts.len(), "CMS analysis collected");
            Some(CmsAnalysis::from_posts(&posts))
        }
        Err(e) => {
            debug!(error = %e, "fetching recent CMS posts failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use autopress_shared::{GeneratedArticle, PublishedPost};
    use chrono::{Duration, Utc};

    use super::*;

    fn article(title: &str, tags: &[&str], days_ago: i64, published: bool) -> Article {
        let mut a = Article::draft(
            "s",
            GeneratedArticle {
                title: title.into(),
                tags: tags.iter().map(|t| (*t).to_string()).collect(),
                ..GeneratedArticle::default()
            },
            None,
            Utc::now() - Duration::days(days_ago),
        );
        if published {
            let post = PublishedPost {
                id: 1,
                link: "https://example.com/?p=1".into(),
            };
            a.mark_published(&post, Utc::now()).unwrap();
        }
        a
    }

    #[test]
    fn only_published_articles_count() {
        let articles = vec![
            article("old", &["副業", "ブログ"], 10, true),
            article("draft", &["副業"], 0, false),
            article("new", &["副業"], 1, true),
        ];
        let analysis = past_analysis(&articles);
        assert_eq!(analysis.total_articles, 2);
        assert_eq!(analysis.titles, vec!["new", "old"]);
        assert_eq!(analysis.keyword_frequency["副業"], 2);
        assert_eq!(analysis.keyword_frequency["ブログ"], 1);
        assert!(analysis.newest_article_date > analysis.oldest_article_date);
    }

    #[test]
    fn empty_history() {
        let analysis = past_analysis(&[]);
        assert_eq!(analysis.total_articles, 0);
        assert!(analysis.newest_article_date.is_none());
    }
}

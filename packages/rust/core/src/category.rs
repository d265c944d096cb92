//! Keyword-weighted category selection.
//!
//! Scores each CMS category against an article's title, body and tags using
//! a keyword table loaded from configuration. Pure: no I/O, no state beyond
//! the table.

use std::collections::BTreeSet;

use autopress_shared::{AppConfig, Category, CategoryId, CategoryProfile, ScoringConfig, default_categories};

/// Separator between the parts of a multi-part category label.
const SUB_LABEL_SEPARATOR: char = '・';

/// Picks the best-matching CMS category for an article.
#[derive(Debug, Clone)]
pub struct CategorySelector {
    profiles: Vec<CategoryProfile>,
    title_weight: u32,
    tag_weight: u32,
    fallback_label: String,
}

impl Default for CategorySelector {
    fn default() -> Self {
        Self::new(default_categories(), &ScoringConfig::default())
    }
}

impl CategorySelector {
    pub fn new(profiles: Vec<CategoryProfile>, scoring: &ScoringConfig) -> Self {
        Self {
            profiles,
            title_weight: scoring.title_weight,
            tag_weight: scoring.tag_weight,
            fallback_label: scoring.fallback_label.clone(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.categories.clone(), &config.scoring)
    }

    /// Keywords for a category name.
    ///
    /// Whole-label containment in either direction wins over a match on one
    /// `・`-separated part of a label. No match yields an empty slice.
    pub fn keywords_for(&self, category_name: &str) -> &[String] {
        if category_name.is_empty() {
            return &[];
        }
        let whole = self
            .profiles
            .iter()
            .find(|p| category_name.contains(p.label.as_str()) || p.label.contains(category_name));
        let partial = || {
            self.profiles.iter().find(|p| {
                p.label
                    .split(SUB_LABEL_SEPARATOR)
                    .any(|part| !part.is_empty() && category_name.contains(part))
            })
        };
        whole
            .or_else(partial)
            .map(|p| p.keywords.as_slice())
            .unwrap_or(&[])
    }

    /// Score one category name against the article.
    pub fn score(&self, title: &str, body: &str, tags: &[String], category_name: &str) -> u32 {
        let keywords: Vec<String> = self
            .keywords_for(category_name)
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| k.to_lowercase())
            .collect();
        if keywords.is_empty() {
            return 0;
        }

        let title_lower = title.to_lowercase();
        let full_text = format!("{} {} {}", title, body, tags.join(" ")).to_lowercase();

        let mut score = 0u32;
        for keyword in &keywords {
            score += self.title_weight * count(&title_lower, keyword);
            score += count(&full_text, keyword);
        }

        let distinct_tags: BTreeSet<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        let tag_hits = distinct_tags.iter().filter(|t| keywords.contains(t)).count() as u32;
        score + self.tag_weight * tag_hits
    }

    /// Best category for the article, or `None` when there are no candidates.
    ///
    /// Ties go to the earliest candidate. When nothing scores, the first
    /// candidate named with the fallback label wins, else the first candidate.
    pub fn select(
        &self,
        title: &str,
        body: &str,
        tags: &[String],
        candidates: &[Category],
    ) -> Option<CategoryId> {
        let first = candidates.first()?;

        let mut best = first;
        let mut best_score = self.score(title, body, tags, &first.name);
        for candidate in &candidates[1..] {
            let score = self.score(title, body, tags, &candidate.name);
            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }

        if best_score == 0 {
            let fallback = candidates
                .iter()
                .find(|c| c.name.contains(self.fallback_label.as_str()))
                .unwrap_or(first);
            tracing::debug!(category = %fallback.name, "no keyword signal, using fallback category");
            return Some(fallback.id);
        }

        tracing::debug!(category = %best.name, score = best_score, "category selected");
        Some(best.id)
    }

    /// Relevance of `text` to every profile: keyword occurrences divided by
    /// the profile's keyword count, in table order.
    pub fn theme_scores(&self, text: &str) -> Vec<(String, f64)> {
        let text = text.to_lowercase();
        self.profiles
            .iter()
            .map(|p| {
                let hits: u32 = p
                    .keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .map(|k| count(&text, &k.to_lowercase()))
                    .sum();
                let relevance = if p.keywords.is_empty() {
                    0.0
                } else {
                    f64::from(hits) / p.keywords.len() as f64
                };
                (p.label.clone(), relevance)
            })
            .collect()
    }
}

/// Non-overlapping occurrences of `needle` in `haystack`.
fn count(haystack: &str, needle: &str) -> u32 {
    haystack.matches(needle).count() as u32
}

//! Duplicate-avoiding topic selection.

use std::collections::HashSet;

use autopress_shared::TopicSuggestion;

/// Default similarity above which a suggestion counts as a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.7;

/// Word-set Jaccard similarity of two titles.
///
/// Words are lowercase whitespace tokens. Two empty titles have similarity 0.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();

    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// First suggestion that is not a near-duplicate of any past title.
///
/// Falls back to the first suggestion when all of them are duplicates, and
/// returns `None` only for an empty list.
pub fn select_topic<'a>(
    suggestions: &'a [TopicSuggestion],
    past_titles: &[String],
    threshold: f64,
) -> Option<&'a TopicSuggestion> {
    let fresh = suggestions.iter().find(|s| {
        past_titles
            .iter()
            .all(|past| title_similarity(&s.title, past) <= threshold)
    });
    if fresh.is_none() && !suggestions.is_empty() {
        tracing::info!(
            suggestions = suggestions.len(),
            "every suggestion resembles a past title, taking the first"
        );
    }
    fresh.or_else(|| suggestions.first())
}

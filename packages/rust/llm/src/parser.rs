//! Parsers for the tagged response formats the prompts ask for.
//!
//! Article responses carry `<title>`, `<description>`, `<tags>` and
//! `<content>`; strategy responses carry repeated `<article>` blocks.

use std::sync::LazyLock;

use regex::Regex;

use autopress_shared::TopicSuggestion;

/// Raw fields of an article response. Missing tags yield empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub content: String,
}

/// Tags the prompts ask Claude to wrap its fields in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Title,
    Description,
    Tags,
    Content,
    Keywords,
    Reason,
    Target,
    ExpectedImpact,
}

impl Tag {
    const ALL: [Tag; 8] = [
        Tag::Title,
        Tag::Description,
        Tag::Tags,
        Tag::Content,
        Tag::Keywords,
        Tag::Reason,
        Tag::Target,
        Tag::ExpectedImpact,
    ];

    fn name(self) -> &'static str {
        match self {
            Tag::Title => "title",
            Tag::Description => "description",
            Tag::Tags => "tags",
            Tag::Content => "content",
            Tag::Keywords => "keywords",
            Tag::Reason => "reason",
            Tag::Target => "target",
            Tag::ExpectedImpact => "expected_impact",
        }
    }

    fn regex(self) -> &'static Regex {
        // Indexed in `Tag::ALL` order.
        static TAG_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
            Tag::ALL
                .iter()
                .map(|tag| {
                    let name = tag.name();
                    Regex::new(&format!(r"(?s)<{name}>(.*?)</{name}>")).expect("valid regex")
                })
                .collect()
        });
        &TAG_RES[self as usize]
    }
}

/// Text between `<tag>` and `</tag>`, trimmed. First occurrence only.
fn extract_tag(text: &str, tag: Tag) -> Option<String> {
    tag.regex()
        .captures(text)
        .map(|c| c[1].trim().to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an article response.
pub fn parse_article(text: &str) -> ParsedArticle {
    ParsedArticle {
        title: extract_tag(text, Tag::Title).unwrap_or_default(),
        description: extract_tag(text, Tag::Description).unwrap_or_default(),
        tags: extract_tag(text, Tag::Tags)
            .map(|t| split_list(&t))
            .unwrap_or_default(),
        content: extract_tag(text, Tag::Content).unwrap_or_default(),
    }
}

/// Parse a strategy response. Blocks without a title are dropped.
pub fn parse_strategy(text: &str) -> Vec<TopicSuggestion> {
    static ARTICLE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<article>(.*?)</article>").expect("valid regex"));

    ARTICLE_RE
        .captures_iter(text)
        .filter_map(|c| {
            let block = &c[1];
            let title = extract_tag(block, Tag::Title).filter(|t| !t.is_empty())?;
            Some(TopicSuggestion {
                title,
                keywords: extract_tag(block, Tag::Keywords)
                    .map(|k| split_list(&k))
                    .unwrap_or_default(),
                reason: extract_tag(block, Tag::Reason).unwrap_or_default(),
                target: extract_tag(block, Tag::Target).unwrap_or_default(),
                expected_impact: extract_tag(block, Tag::ExpectedImpact).unwrap_or_default(),
            })
        })
        .collect()
}

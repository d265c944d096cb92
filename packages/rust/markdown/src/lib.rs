//! Markdown and HTML conversions used around publishing.
//!
//! - [`tidy_article`]: cleanup passes for model-written article bodies
//! - [`to_html`]: Markdown → HTML for the CMS (`pulldown-cmark`)
//! - [`excerpt`]: short plain-text teaser from a Markdown body
//! - [`html_to_markdown`] / [`plain_text`]: reading rendered CMS content back

mod cleanup;

use std::sync::LazyLock;

use pulldown_cmark::{Options, Parser, html};
use regex::Regex;
use scraper::Html;
use tracing::debug;

use autopress_shared::{AutopressError, Result};

/// Default excerpt length in characters.
pub const EXCERPT_CHARS: usize = 150;

// ---------------------------------------------------------------------------
// Markdown → Markdown
// ---------------------------------------------------------------------------

/// Normalize a generated article body: drops a heading that repeats `title`,
/// demotes stray H1s, and collapses blank lines.
pub fn tidy_article(md: &str, title: &str) -> String {
    cleanup::run_pipeline(md, title)
}

// ---------------------------------------------------------------------------
// Markdown → HTML
// ---------------------------------------------------------------------------

/// Render Markdown to HTML with tables and strikethrough enabled.
pub fn to_html(md: &str) -> String {
    if md.trim().is_empty() {
        return String::new();
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(md, options);
    let mut out = String::with_capacity(md.len() * 3 / 2);
    html::push_html(&mut out, parser);
    debug!(md_len = md.len(), html_len = out.len(), "rendered markdown");
    out
}

// ---------------------------------------------------------------------------
// Excerpt
// ---------------------------------------------------------------------------

/// First `max_chars` characters of the body with headings and bold markers
/// removed, followed by `...` when truncated.
pub fn excerpt(md: &str, max_chars: usize) -> String {
    static HEADING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"#[^\n]*\n").expect("valid regex"));
    static BOLD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\*\*(.*?)\*\*").expect("valid regex"));

    let text = HEADING_RE.replace_all(md, "");
    let text = BOLD_RE.replace_all(&text, "$1");
    let text = text.trim_start();

    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// HTML → text
// ---------------------------------------------------------------------------

/// Convert rendered CMS HTML back to Markdown.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "iframe", "noscript", "svg"])
        .build();

    converter
        .convert(html)
        .map(|md| cleanup::run_pipeline(&md, ""))
        .map_err(|e| AutopressError::Conversion(format!("htmd conversion failed: {e}")))
}

/// Text content of an HTML fragment with entities decoded and whitespace collapsed.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Cleanup passes for model-written Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on an article body.
pub(crate) fn run_pipeline(md: &str, title: &str) -> String {
    let md = normalize_line_endings(md);
    let md = unwrap_code_fence(&md);
    let md = drop_title_heading(&md, title);
    let md = demote_extra_h1(&md);
    let md = clean_blank_lines(&md);
    trim_trailing_whitespace(&md)
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Unwrap a body that was wrapped whole in a ```markdown fence
// ---------------------------------------------------------------------------

fn unwrap_code_fence(md: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\A\s*```(?:markdown|md)?\n(.*?)\n```\s*\z").expect("valid regex")
    });

    match FENCE_RE.captures(md) {
        Some(c) => c[1].to_string(),
        None => md.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 3: Remove a leading H1 that repeats the post title
// ---------------------------------------------------------------------------

/// The CMS renders the title itself, so a duplicate `# Title` is dropped.
fn drop_title_heading(md: &str, title: &str) -> String {
    let trimmed = md.trim_start();
    let Some(first_line) = trimmed.lines().next() else {
        return md.to_string();
    };

    match first_line.strip_prefix("# ") {
        Some(heading) if !title.is_empty() && heading.trim() == title.trim() => trimmed
            [first_line.len()..]
            .trim_start_matches('\n')
            .to_string(),
        _ => md.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 4: Heading hierarchy
// ---------------------------------------------------------------------------

/// Article bodies start at H2; any remaining H1 becomes H2.
fn demote_extra_h1(md: &str) -> String {
    let mut in_code = false;
    md.lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code = !in_code;
            }
            match line.strip_prefix("# ") {
                Some(rest) if !in_code => format!("## {rest}"),
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Blank lines and trailing whitespace
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ newlines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK.replace_all(md, "\n\n").to_string()
}

fn trim_trailing_whitespace(md: &str) -> String {
    let trimmed: Vec<&str> = md.lines().map(str::trim_end).collect();
    trimmed.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_duplicate_title_heading() {
        let md = "# 副業の始め方\n\n## はじめに\n本文";
        let result = run_pipeline(md, "副業の始め方");
        assert!(result.starts_with("## はじめに"));
    }

    #[test]
    fn keeps_unrelated_h1_but_demotes_it() {
        let md = "# 別の見出し\n本文";
        let result = run_pipeline(md, "副業の始め方");
        assert!(result.starts_with("## 別の見出し"));
    }

    #[test]
    fn demote_skips_code_blocks() {
        let md = "## Shell\n```bash\n# comment\n```";
        assert_eq!(demote_extra_h1(md), md);
    }

    #[test]
    fn unwraps_markdown_fence() {
        let md = "```markdown\n## 見出し\n本文\n```";
        assert_eq!(unwrap_code_fence(md), "## 見出し\n本文");
    }

    #[test]
    fn collapses_blank_lines_and_crlf() {
        let md = "a\r\n\r\n\r\n\r\nb   \n";
        assert_eq!(run_pipeline(md, ""), "a\n\nb");
    }
}

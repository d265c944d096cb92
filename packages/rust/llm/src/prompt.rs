//! Prompt construction for strategy and article requests.

use std::fmt::Write as _;

use autopress_shared::{CmsAnalysis, GenerationRequest, PastAnalysis, Site};

/// Most frequent keywords, highest count first, ties by keyword.
fn top_keywords(past: &PastAnalysis, n: usize) -> Vec<(&str, usize)> {
    let mut pairs: Vec<(&str, usize)> = past
        .keyword_frequency
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    pairs.truncate(n);
    pairs
}

/// Ask for five topic suggestions in `<suggestions><article>…` form.
pub fn strategy_prompt(site: &Site, past: &PastAnalysis, cms: Option<&CmsAnalysis>) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "あなたは{}のコンテンツストラテジストです。", site.name);
    let _ = writeln!(p, "過去の記事を分析し、次に書くべき記事テーマを提案してください。\n");

    let _ = writeln!(p, "【サイト情報】");
    let _ = writeln!(p, "- サイト名: {}", site.name);
    let _ = writeln!(p, "- ジャンル: {}", site.genre);
    let _ = writeln!(p, "- ターゲット: {}", site.target_audience);
    let _ = writeln!(p, "- キーワード: {}\n", site.keywords_focus.join(", "));

    let _ = writeln!(p, "【過去記事分析】");
    let _ = writeln!(p, "- 総記事数: {}", past.total_articles);
    let _ = writeln!(p, "- 最近の記事タイトル:");
    for title in past.titles.iter().take(10) {
        let _ = writeln!(p, "  - {title}");
    }
    let _ = writeln!(p, "- よく使われるキーワード:");
    for (keyword, count) in top_keywords(past, 10) {
        let _ = writeln!(p, "  - {keyword}: {count}回");
    }

    if let Some(cms) = cms {
        let _ = writeln!(p, "\n【WordPress既存記事】");
        let _ = writeln!(p, "- 既存記事数: {}", cms.total_posts);
        for title in cms.titles.iter().take(5) {
            let _ = writeln!(p, "  - {title}");
        }
    }

    p.push_str(
        "\n以下の形式で5つの記事テーマを提案してください：\n\n\
         <suggestions>\n<article>\n<title>記事タイトル案</title>\n\
         <keywords>キーワード1, キーワード2, キーワード3</keywords>\n\
         <reason>この記事を書く理由</reason>\n<target>想定読者層</target>\n\
         <expected_impact>期待される効果</expected_impact>\n</article>\n</suggestions>\n\n\
         既存記事と重複しないテーマにし、時期や季節を示すワードは使わないでください。\n",
    );
    p
}

/// Ask for one article in `<title>/<description>/<tags>/<content>` form.
pub fn article_prompt(req: &GenerationRequest) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "{}に関する記事を作成してください。\n", req.genre);
    let _ = writeln!(p, "【記事要件】");
    let _ = writeln!(p, "- テーマ: {}", req.topic);
    let _ = writeln!(p, "- キーワード: {}", req.keywords.join(", "));
    let _ = writeln!(p, "- ターゲット読者: {}", req.target_audience);
    if !req.tone.is_empty() {
        let _ = writeln!(p, "- 文体: {}", req.tone);
    }
    let _ = writeln!(p, "- 目標文字数: {}文字程度（必須）\n", req.length);

    p.push_str(
        "以下の形式で出力してください：\n\n\
         <title>記事タイトル</title>\n\n\
         <description>メタディスクリプション（120文字程度）</description>\n\n\
         <tags>タグ1, タグ2, タグ3</tags>\n\n\
         <content>\n記事本文（見出しは##、###を使用したマークダウン形式）\n</content>\n",
    );
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn top_keywords_sorted_by_count() {
        let past = PastAnalysis {
            keyword_frequency: BTreeMap::from([
                ("ブログ".to_string(), 2),
                ("副業".to_string(), 5),
                ("SEO".to_string(), 2),
            ]),
            ..PastAnalysis::default()
        };
        let top = top_keywords(&past, 2);
        assert_eq!(top, vec![("副業", 5), ("SEO", 2)]);
    }

    #[test]
    fn article_prompt_mentions_length_and_keywords() {
        let req = GenerationRequest {
            topic: "在宅ワーク入門".into(),
            keywords: vec!["在宅".into(), "入門".into()],
            length: 3000,
            tone: String::new(),
            genre: "副業".into(),
            target_audience: "会社員".into(),
        };
        let prompt = article_prompt(&req);
        assert!(prompt.contains("3000文字"));
        assert!(prompt.contains("在宅, 入門"));
        assert!(prompt.contains("<content>"));
        assert!(!prompt.contains("文体"));
    }
}

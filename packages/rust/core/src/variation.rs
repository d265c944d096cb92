//! Angle keywords that keep same-day articles from converging on one take.

/// Five angle groups, picked by the article's index within the day.
const ANGLE_POOL: [[&str; 4]; 5] = [
    ["入門", "基本", "始め方", "初心者"],
    ["コツ", "ポイント", "効率化", "時短"],
    ["失敗例", "注意点", "リスク", "対策"],
    ["成功事例", "実例", "体験談", "レビュー"],
    ["最新", "トレンド", "最新版", "新常識"],
];

/// Number of angle keywords appended per article.
const ANGLES_PER_ARTICLE: usize = 2;

/// `base` plus two angle keywords from group `index % 5`.
///
/// The starting position inside the group rotates every full pass over the
/// pool. Keywords already present in `base` are never repeated.
pub fn angle_keywords(base: &[String], index: usize) -> Vec<String> {
    let group = &ANGLE_POOL[index % ANGLE_POOL.len()];
    let offset = (index / ANGLE_POOL.len()) % group.len();

    let mut keywords = base.to_vec();
    let extras: Vec<String> = (0..group.len())
        .map(|i| group[(offset + i) % group.len()])
        .filter(|k| !base.iter().any(|b| b == k))
        .take(ANGLES_PER_ARTICLE)
        .map(str::to_string)
        .collect();
    keywords.extend(extras);
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn adds_two_from_indexed_group() {
        assert_eq!(
            angle_keywords(&kw(&["副業"]), 0),
            kw(&["副業", "入門", "基本"])
        );
        assert_eq!(
            angle_keywords(&kw(&["副業"]), 2),
            kw(&["副業", "失敗例", "注意点"])
        );
    }

    #[test]
    fn rotates_after_full_pass() {
        assert_eq!(angle_keywords(&[], 5), kw(&["基本", "始め方"]));
    }

    #[test]
    fn skips_existing_keywords() {
        assert_eq!(
            angle_keywords(&kw(&["初心者", "入門"]), 0),
            kw(&["初心者", "入門", "基本", "始め方"])
        );
    }
}

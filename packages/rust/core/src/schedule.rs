//! Eligibility: operating-hour windows and daily quotas.
//!
//! All calendar arithmetic happens in the clock's local offset, so a site's
//! "today" is the operator's calendar day rather than the UTC one.

use chrono::{DateTime, FixedOffset, Local, Timelike};

use autopress_shared::{Article, OperatingWindow, Site};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the process's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Why a site was not processed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    OutsideHours { hour: u32 },
    QuotaReached { today: usize, quota: u32 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("site disabled"),
            Self::OutsideHours { hour } => write!(f, "outside operating hours ({hour}:00)"),
            Self::QuotaReached { today, quota } => {
                write!(f, "daily quota reached ({today}/{quota})")
            }
        }
    }
}

/// Whether `hour` falls inside the window.
///
/// `start > end` wraps past midnight. `start == end` is a full-day window.
pub fn in_operating_window(window: &OperatingWindow, hour: u32) -> bool {
    let OperatingWindow { start, end } = *window;
    if start == end {
        true
    } else if start < end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Number of articles created on the local calendar day of `now`.
pub fn articles_on_day(articles: &[Article], now: &DateTime<FixedOffset>) -> usize {
    let today = now.date_naive();
    let offset = now.offset();
    articles
        .iter()
        .filter(|a| a.created_at.with_timezone(offset).date_naive() == today)
        .count()
}

/// Reason to skip the site, or `None` when it is eligible.
pub fn skip_reason(site: &Site, articles_today: usize, hour: u32) -> Option<SkipReason> {
    if !site.enabled {
        return Some(SkipReason::Disabled);
    }
    if !in_operating_window(&site.operating_hours, hour) {
        return Some(SkipReason::OutsideHours { hour });
    }
    if articles_today >= site.daily_quota as usize {
        return Some(SkipReason::QuotaReached {
            today: articles_today,
            quota: site.daily_quota,
        });
    }
    None
}

/// Eligibility check against the site's stored articles.
pub fn is_eligible(site: &Site, articles: &[Article], now: &DateTime<FixedOffset>) -> bool {
    skip_reason(site, articles_on_day(articles, now), now.hour()).is_none()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use autopress_shared::{GeneratedArticle, ImageSettings};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn site(start: u32, end: u32, quota: u32) -> Site {
        Site {
            id: "s".into(),
            name: "S".into(),
            url: "https://example.com".into(),
            genre: String::new(),
            target_audience: String::new(),
            keywords_focus: vec![],
            daily_quota: quota,
            min_interval: Duration::ZERO,
            operating_hours: OperatingWindow { start, end },
            auto_publish: false,
            require_approval: false,
            article_length: 7000,
            tone: String::new(),
            image: ImageSettings::default(),
            credentials: None,
            enabled: true,
        }
    }

    fn jst(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    fn article_at(at: DateTime<Utc>) -> Article {
        Article::draft("s", GeneratedArticle::default(), None, at)
    }

    #[test]
    fn plain_window_is_half_open() {
        let w = OperatingWindow { start: 6, end: 23 };
        assert!(!in_operating_window(&w, 5));
        assert!(in_operating_window(&w, 6));
        assert!(in_operating_window(&w, 22));
        assert!(!in_operating_window(&w, 23));
    }

    #[test]
    fn wrapping_window() {
        let w = OperatingWindow { start: 22, end: 6 };
        for hour in [22, 23, 0, 5] {
            assert!(in_operating_window(&w, hour), "hour {hour}");
        }
        for hour in 6..=21 {
            assert!(!in_operating_window(&w, hour), "hour {hour}");
        }
    }

    #[test]
    fn equal_bounds_cover_whole_day() {
        let w = OperatingWindow { start: 8, end: 8 };
        assert!((0..24).all(|h| in_operating_window(&w, h)));
    }

    #[test]
    fn quota_blocks_regardless_of_hours() {
        let now = jst(2025, 3, 10, 10);
        let articles = vec![
            article_at(now.with_timezone(&Utc)),
            article_at(now.with_timezone(&Utc)),
        ];
        assert!(!is_eligible(&site(0, 0, 2), &articles, &now));
        assert!(is_eligible(&site(0, 0, 3), &articles, &now));
        assert_eq!(
            skip_reason(&site(6, 23, 2), 2, 10),
            Some(SkipReason::QuotaReached { today: 2, quota: 2 })
        );
    }

    #[test]
    fn day_boundary_uses_local_offset() {
        // 2025-03-09 16:00 UTC is 2025-03-10 01:00 in JST.
        let late_utc = Utc.with_ymd_and_hms(2025, 3, 9, 16, 0, 0).unwrap();
        // 2025-03-09 14:00 UTC is 2025-03-09 23:00 in JST.
        let yesterday = Utc.with_ymd_and_hms(2025, 3, 9, 14, 0, 0).unwrap();
        let articles = vec![article_at(late_utc), article_at(yesterday)];
        assert_eq!(articles_on_day(&articles, &jst(2025, 3, 10, 10)), 1);
    }

    #[test]
    fn disabled_site_is_skipped_first() {
        let mut s = site(6, 23, 5);
        s.enabled = false;
        assert_eq!(skip_reason(&s, 0, 10), Some(SkipReason::Disabled));
        assert_eq!(
            skip_reason(&site(6, 23, 5), 0, 3),
            Some(SkipReason::OutsideHours { hour: 3 })
        );
        assert_eq!(skip_reason(&site(6, 23, 5), 4, 10), None);
    }
}

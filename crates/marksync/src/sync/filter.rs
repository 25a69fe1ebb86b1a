use chrono::{DateTime, Duration, Utc};

use crate::types::BookmarkItem;

/// Start of a window reaching `days_back` days before `now`.
pub fn recent_cutoff(now: DateTime<Utc>, days_back: u32) -> DateTime<Utc> {
    cutoff_before(now, Duration::days(i64::from(days_back)))
}

/// `now - span`, clamped to the earliest representable instant.
pub fn cutoff_before(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Keep items created at or after `cutoff`.
pub fn filter_created_since(items: Vec<BookmarkItem>, cutoff: DateTime<Utc>) -> Vec<BookmarkItem> {
    items
        .into_iter()
        .filter(|item| item.created_at >= cutoff)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> BookmarkItem {
        BookmarkItem {
            id: day.to_string(),
            url: format!("https://example.com/{day}"),
            title: String::new(),
            tags: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap(),
            image_url: None,
        }
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let cutoff = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let kept = filter_created_since(vec![at(9), at(10), at(11)], cutoff);
        assert_eq!(
            kept.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["10", "11"]
        );
    }

    #[test]
    fn test_recent_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
        assert_eq!(
            recent_cutoff(now, 30),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_recent_cutoff_saturates_for_huge_windows() {
        let now = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
        assert_eq!(recent_cutoff(now, 200_000_000), DateTime::<Utc>::MIN_UTC);
        assert_eq!(recent_cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(
            cutoff_before(now, Duration::hours(i64::from(u32::MAX))),
            DateTime::<Utc>::MIN_UTC
        );
    }
}

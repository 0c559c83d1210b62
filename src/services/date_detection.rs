//! Date detection for listing entries.
//!
//! The listing shows dates like "3rd Jan" with no year. The year is inferred
//! from the current date: a date more than one day ahead of today must belong
//! to the previous year.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

/// `<day><ordinal> <Mon>` anywhere in a block of text.
static LISTING_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)(?:st|nd|rd|th)\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)")
        .unwrap()
});

/// Ordinal suffix directly after a day number.
static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)(st|nd|rd|th)").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Resolve a partial date such as `"3rd Jan"` relative to `today`.
///
/// Returns `None` when the text is not `<day> <month>` after stripping the
/// ordinal suffix, or when no valid calendar date results.
pub fn resolve_relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = ORDINAL_SUFFIX.replace_all(text.trim(), "$1");
    let mut parts = cleaned.split_whitespace();
    let day: u32 = parts.next()?.parse().ok()?;
    let month = month_number(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }

    let year = today.year();
    // A Feb 29 listing in a non-leap year can only come from the year before.
    let date = match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => return NaiveDate::from_ymd_opt(year - 1, month, day),
    };

    if date > today + Duration::days(1) {
        date.with_year(year - 1)
    } else {
        Some(date)
    }
}

/// Find the first listing date inside free text and resolve it.
pub fn find_listing_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = LISTING_DATE.captures(text)?;
    let partial = format!("{} {}", &caps[1], &caps[2]);
    resolve_relative_date(&partial, today)
}

/// Month number from an abbreviated (or full) English month name.
fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|idx| idx as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_resolves_current_year() {
        let today = d(2024, 3, 10);
        assert_eq!(resolve_relative_date("3rd Mar", today), Some(d(2024, 3, 3)));
        assert_eq!(resolve_relative_date("1st jan", today), Some(d(2024, 1, 1)));
        assert_eq!(resolve_relative_date("22nd Feb", today), Some(d(2024, 2, 22)));
    }

    #[test]
    fn test_tomorrow_stays_in_current_year() {
        let today = d(2024, 3, 10);
        assert_eq!(resolve_relative_date("11th Mar", today), Some(d(2024, 3, 11)));
    }

    #[test]
    fn test_future_date_rolls_back_a_year() {
        let today = d(2024, 1, 2);
        assert_eq!(resolve_relative_date("30th Dec", today), Some(d(2023, 12, 30)));
        assert_eq!(resolve_relative_date("12th Mar", d(2024, 3, 10)), Some(d(2023, 3, 12)));
    }

    #[test]
    fn test_unparseable_input() {
        let today = d(2024, 3, 10);
        assert_eq!(resolve_relative_date("", today), None);
        assert_eq!(resolve_relative_date("yesterday", today), None);
        assert_eq!(resolve_relative_date("3rd Foo", today), None);
        assert_eq!(resolve_relative_date("32nd Jan", today), None);
        assert_eq!(resolve_relative_date("3rd Jan 2020", today), None);
    }

    #[test]
    fn test_leap_day_in_non_leap_year_uses_previous_year() {
        assert_eq!(resolve_relative_date("29th Feb", d(2025, 3, 1)), Some(d(2024, 2, 29)));
        assert_eq!(resolve_relative_date("29th Feb", d(2023, 3, 1)), None);
    }

    #[test]
    fn test_never_more_than_one_day_ahead() {
        let today = d(2024, 6, 15);
        let mut date = d(2023, 6, 16);
        while date <= d(2024, 6, 15) + Duration::days(200) {
            let text = format!("{}th {}", date.day(), date.format("%b"));
            let resolved = resolve_relative_date(&text, today).unwrap();
            assert!(resolved <= today + Duration::days(1), "{text} -> {resolved}");
            assert!(resolved > today - Duration::days(366), "{text} -> {resolved}");
            date += Duration::days(1);
        }
    }

    #[test]
    fn test_find_listing_date_in_container_text() {
        let today = d(2024, 3, 10);
        let text = "Ad of the day\n5th Mar - Natuur en Bos reflects on life\nBy shots";
        assert_eq!(find_listing_date(text, today), Some(d(2024, 3, 5)));
        assert_eq!(find_listing_date("no date here", today), None);
        assert_eq!(find_listing_date("2nd MAR", today), Some(d(2024, 3, 2)));
    }
}

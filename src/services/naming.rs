//! Deterministic output filenames.
//!
//! The filename is the on-disk dedup key, so the same title, author and date
//! must always produce the same name.

use chrono::NaiveDate;

/// Extension used when the caller does not supply one.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Characters that are not allowed in filenames on common filesystems.
const FORBIDDEN: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Remove forbidden characters, turn newlines into spaces and trim.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Pick the page heading when available, else the listing title.
pub fn final_title<'a>(exact_title: Option<&'a str>, listing_title: &'a str) -> &'a str {
    match exact_title {
        Some(title) if !title.trim().is_empty() => title,
        _ => listing_title,
    }
}

/// Compose `"{title} Director by {author} {yyMMdd}.{ext}"`.
pub fn build_filename(title: &str, author: &str, date: NaiveDate, extension: &str) -> String {
    let title = title.replace(['\r', '\n'], " ");
    let name = format!(
        "{} Director by {} {}.{}",
        title.trim(),
        author.trim(),
        date.format("%y%m%d"),
        extension
    );
    sanitize_filename(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[test]
    fn test_build_filename_example() {
        assert_eq!(
            build_filename("A Film: Part 2?", "J. Smith", date(), DEFAULT_EXTENSION),
            "A Film Part 2 Director by J. Smith 240305.mp4"
        );
    }

    #[test]
    fn test_build_filename_is_deterministic() {
        let first = build_filename("Title <1>", "A|B", date(), "mp4");
        let second = build_filename("Title <1>", "A|B", date(), "mp4");
        assert_eq!(first, second);
        assert_eq!(sanitize_filename(&first), first);
    }

    #[test]
    fn test_build_filename_strips_all_forbidden_characters() {
        let name = build_filename(r#"a\b/c*d?e:f"g<h>i|j"#, r#"x"/y"#, date(), "mp4");
        assert!(!name.contains(FORBIDDEN));
        assert_eq!(name, "abcdefghij Director by xy 240305.mp4");
    }

    #[test]
    fn test_newlines_become_spaces() {
        let name = build_filename("  Line one\nLine two  ", "Dir", date(), "mp4");
        assert_eq!(name, "Line one Line two Director by Dir 240305.mp4");
    }

    #[test]
    fn test_final_title_prefers_exact_title() {
        assert_eq!(final_title(Some("Page Title"), "Listing"), "Page Title");
        assert_eq!(final_title(Some("  "), "Listing"), "Listing");
        assert_eq!(final_title(None, "Listing"), "Listing");
    }
}

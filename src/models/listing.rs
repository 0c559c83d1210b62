//! Listing models produced by the scanner.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One dated entry discovered on the listing page.
///
/// Identity is the `link`; everything except `selected` is fixed once the
/// scanner creates the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub title: String,
    pub published_date: NaiveDate,
    pub link: String,
    /// Whether the entry should be downloaded. Defaults to true.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl ListingEntry {
    pub fn new(title: impl Into<String>, published_date: NaiveDate, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            published_date,
            link: link.into(),
            selected: true,
        }
    }
}

/// Raw item as read from the listing DOM, before any date parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    /// Full text of the item's container element.
    #[serde(default)]
    pub container_text: String,
    /// Text of the item's first link.
    #[serde(default)]
    pub link_text: String,
    /// Absolute target of the item's first link.
    pub href: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Scan window start {start} is after end {end}")]
pub struct WindowError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive date range requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ScanWindow {
    /// Create a window, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering the `days` days before `today`, through `today`.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

//! Data models for reelfetch.

mod listing;
mod media;
mod page;

pub use listing::{ListingEntry, ListingItem, ScanWindow, WindowError};
pub use media::{DownloadOutcome, MediaCandidate, ResolutionResult, UNKNOWN_AUTHOR};
pub use page::{NetworkResponse, PageSnapshot, TextNode};

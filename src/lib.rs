//! reelfetch - date-bounded discovery and download of published videos.
//!
//! Scans a paginated listing for entries inside a date window, resolves the
//! real media asset behind each entry page, and downloads it with size
//! validation and idempotent re-runs.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod scrapers;
pub mod services;

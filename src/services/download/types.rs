//! Download service types and events.

use std::time::Duration;

use crate::error::SessionError;
use crate::models::{DownloadOutcome, ListingEntry};

/// Events emitted while a batch is processed.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    /// An entry was handed to a worker.
    Started { index: usize, title: String },
    /// An entry reached its terminal outcome.
    Completed {
        index: usize,
        completed: usize,
        total: usize,
        outcome: DownloadOutcome,
    },
}

/// Result of a batch, in completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(ListingEntry, DownloadOutcome)>,
    /// Entries never processed because the batch was halted.
    pub skipped: Vec<ListingEntry>,
    /// Error that halted the batch, if any.
    pub fatal: Option<SessionError>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Configuration for the download service.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum number of entries in flight.
    pub workers: usize,
    /// Pause before each new pool-sized batch of submissions.
    pub batch_pause: Duration,
    /// Pause before every other submission.
    pub item_pause: Duration,
}

/// Format a byte count as megabytes for outcome messages.
pub fn megabytes(bytes: u64) -> String {
    format!("{:.2}MB", bytes as f64 / (1024.0 * 1024.0))
}

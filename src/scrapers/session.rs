//! Browser session capability interface.
//!
//! Scanner and resolver only talk to a browser through [`PageSession`], so
//! their algorithms run unchanged against a real Chrome or an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::SessionError;
use crate::models::{ListingItem, NetworkResponse, PageSnapshot};

/// One browser tab with its own process lifetime.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`, failing if the load does not finish within `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Let the page run for `duration`.
    async fn wait(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Serialize the page's heading and text structure.
    async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError>;

    /// Read listing items from every element matching `selectors`.
    async fn listing_items(
        &mut self,
        selectors: &[String],
    ) -> Result<Vec<ListingItem>, SessionError>;

    /// Click the first visible element matching any of `selectors`.
    /// Returns false when nothing visible matched.
    async fn click_selector(&mut self, selectors: &[String]) -> Result<bool, SessionError>;

    /// Click the first visible element whose text is `label`.
    /// Returns false when nothing visible matched.
    async fn click_text(&mut self, label: &str) -> Result<bool, SessionError>;

    /// Drain the responses observed since the last call.
    fn take_responses(&mut self) -> Vec<NetworkResponse>;

    /// Tear down the tab and, for launched browsers, the browser process.
    async fn close(self: Box<Self>);
}

/// Opens a fresh [`PageSession`] per logical operation.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageSession>, SessionError>;
}

/// Append-only, bounded record of responses seen during one page visit.
#[derive(Debug, Default)]
pub struct ResponseLog {
    entries: Vec<NetworkResponse>,
    capacity: usize,
    dropped: usize,
}

impl ResponseLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Record a response. Returns false once the log is full.
    pub fn push(&mut self, response: NetworkResponse) -> bool {
        if self.entries.len() >= self.capacity {
            if self.dropped == 0 {
                warn!(
                    "Response log full at {} entries, ignoring further responses",
                    self.capacity
                );
            }
            self.dropped += 1;
            return false;
        }
        self.entries.push(response);
        true
    }

    /// Number of responses ignored because the log was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Take all recorded entries.
    pub fn drain(&mut self) -> Vec<NetworkResponse> {
        std::mem::take(&mut self.entries)
    }
}

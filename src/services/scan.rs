//! Date-bounded discovery over the paginated listing.
//!
//! The listing is newest-first but not strictly ordered, and a "load more"
//! control appends older items to the same page. Scanning continues one round
//! past the first round that reaches older than the window start so that
//! items straddling the boundary are not missed.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ScanSettings;
use crate::error::SessionError;
use crate::models::{ListingEntry, ListingItem, ScanWindow};
use crate::scrapers::{PageSession, SessionLauncher};
use crate::services::date_detection::find_listing_date;

/// Leading `"3rd Jan - "` style prefix on listing titles.
static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+(st|nd|rd|th)\s+\w{3}\s*[-|]*\s*").unwrap());

/// Derive a display title for a listing item.
pub fn clean_title(link_text: &str, container_text: &str) -> String {
    let raw = match link_text.trim() {
        "" => container_text.lines().next().unwrap_or_default().trim(),
        text => text,
    };
    let cleaned = DATE_PREFIX.replace(raw, "");
    match cleaned.trim() {
        "" => raw.to_string(),
        title => title.to_string(),
    }
}

/// Why a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// One round past the window start was scanned.
    BoundaryPassed,
    EntryCap,
    RoundCap,
    /// The "load more" control was missing or could not be clicked.
    Exhausted,
    /// The page stopped answering mid-scan.
    PageError,
}

/// Progress notifications from a running scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    RoundStarted { round: u32 },
    RoundScanned {
        round: u32,
        found: usize,
        oldest: Option<NaiveDate>,
    },
    BoundaryReached { round: u32 },
    Finished { found: usize, reason: StopReason },
}

/// Summary of one ingested round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    pub new_entries: usize,
    /// Oldest date among items first seen this round.
    pub oldest: Option<NaiveDate>,
    /// True only for the round that first reached past the window start.
    pub boundary_hit: bool,
}

/// Pagination state, independent of any browser.
#[derive(Debug)]
pub struct ScanState {
    window: ScanWindow,
    max_rounds: u32,
    max_entries: usize,
    processed: HashSet<String>,
    entries: Vec<ListingEntry>,
    round: u32,
    boundary_hit_at: Option<u32>,
}

impl ScanState {
    pub fn new(window: ScanWindow, max_rounds: u32, max_entries: usize) -> Self {
        Self {
            window,
            max_rounds,
            max_entries,
            processed: HashSet::new(),
            entries: Vec::new(),
            round: 0,
            boundary_hit_at: None,
        }
    }

    pub fn begin_round(&mut self) -> u32 {
        self.round += 1;
        self.round
    }

    /// Absorb every item currently visible on the page.
    ///
    /// Items already processed or without a parseable date are ignored.
    pub fn ingest(&mut self, items: &[ListingItem], today: NaiveDate) -> RoundSummary {
        let mut oldest: Option<NaiveDate> = None;
        let mut new_entries = 0;

        for item in items {
            if self.processed.contains(&item.href) {
                continue;
            }
            let Some(date) = find_listing_date(&item.container_text, today) else {
                continue;
            };
            self.processed.insert(item.href.clone());
            oldest = Some(oldest.map_or(date, |o| o.min(date)));

            if self.window.contains(date) {
                let title = clean_title(&item.link_text, &item.container_text);
                self.entries
                    .push(ListingEntry::new(title, date, item.href.clone()));
                new_entries += 1;
            }
        }

        let boundary_hit = self.boundary_hit_at.is_none()
            && oldest.is_some_and(|o| o < self.window.start());
        if boundary_hit {
            self.boundary_hit_at = Some(self.round);
        }

        RoundSummary {
            round: self.round,
            new_entries,
            oldest,
            boundary_hit,
        }
    }

    /// Whether the scan must end after the current round.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.boundary_hit_at.is_some_and(|hit| self.round > hit) {
            Some(StopReason::BoundaryPassed)
        } else if self.entries.len() > self.max_entries {
            Some(StopReason::EntryCap)
        } else if self.round > self.max_rounds {
            Some(StopReason::RoundCap)
        } else {
            None
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ListingEntry> {
        self.entries
    }
}

/// Scans the listing page for entries inside a window.
pub struct Scanner {
    launcher: Arc<dyn SessionLauncher>,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: ScanSettings) -> Self {
        Self { launcher, settings }
    }

    /// Collect entries published inside `window`, in discovery order.
    ///
    /// Fails only when the browser cannot be started or the listing page
    /// cannot be opened. Later page errors end the scan with what was found.
    pub async fn scan(
        &self,
        window: ScanWindow,
        today: NaiveDate,
        events: Option<mpsc::Sender<ScanEvent>>,
    ) -> Result<Vec<ListingEntry>, SessionError> {
        let mut session = self.launcher.launch().await?;
        let result = self.paginate(session.as_mut(), window, today, &events).await;
        session.close().await;
        result
    }

    async fn paginate(
        &self,
        session: &mut dyn PageSession,
        window: ScanWindow,
        today: NaiveDate,
        events: &Option<mpsc::Sender<ScanEvent>>,
    ) -> Result<Vec<ListingEntry>, SessionError> {
        let emit = |event: ScanEvent| async move {
            if let Some(tx) = events {
                let _ = tx.send(event).await;
            }
        };

        info!(
            "Scanning {} for {} to {}",
            self.settings.base_url,
            window.start(),
            window.end()
        );
        session
            .navigate(&self.settings.base_url, self.settings.navigation_timeout())
            .await?;
        session.wait(self.settings.initial_wait()).await;

        let mut state = ScanState::new(window, self.settings.max_rounds, self.settings.max_entries);

        let reason = loop {
            let round = state.begin_round();
            emit(ScanEvent::RoundStarted { round }).await;

            let items = match session.listing_items(&self.settings.item_selectors).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("Listing read failed in round {}: {}", round, e);
                    break StopReason::PageError;
                }
            };

            let summary = state.ingest(&items, today);
            debug!(
                "Round {}: {} items visible, {} new entries, oldest {:?}",
                round,
                items.len(),
                summary.new_entries,
                summary.oldest
            );
            emit(ScanEvent::RoundScanned {
                round,
                found: state.entries().len(),
                oldest: summary.oldest,
            })
            .await;
            if summary.boundary_hit {
                info!("Reached window start in round {}, scanning one more", round);
                emit(ScanEvent::BoundaryReached { round }).await;
            }

            if let Some(reason) = state.stop_reason() {
                break reason;
            }

            match session.click_text(&self.settings.load_more_label).await {
                Ok(true) => session.wait(self.settings.load_more_wait()).await,
                Ok(false) => break StopReason::Exhausted,
                Err(e) => {
                    debug!("Load more failed: {}", e);
                    break StopReason::Exhausted;
                }
            }
        };

        info!(
            "Scan finished after {} rounds ({:?}): {} entries",
            state.round(),
            reason,
            state.entries().len()
        );
        emit(ScanEvent::Finished {
            found: state.entries().len(),
            reason,
        })
        .await;

        Ok(state.into_entries())
    }
}

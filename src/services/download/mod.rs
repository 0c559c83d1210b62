//! Batch download service.
//!
//! Dispatches selected listing entries to a bounded pool of workers and
//! collects one outcome per entry. Separated from UI concerns - emits events
//! for progress tracking.

mod pipeline;
mod strategy;
mod types;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::models::{DownloadOutcome, ListingEntry};

pub use pipeline::{EntryProcessor, ItemPipeline};
pub use strategy::DownloadStrategy;
pub use types::{megabytes, BatchReport, DownloadConfig, DownloadEvent};

/// Start offset of every submission relative to the first.
///
/// Before submission `i > 0` the schedule pauses `batch_pause` when `i` opens
/// a new pool-sized batch, `item_pause` otherwise.
pub fn pacing_schedule(
    count: usize,
    workers: usize,
    batch_pause: Duration,
    item_pause: Duration,
) -> Vec<Duration> {
    let workers = workers.max(1);
    let mut offset = Duration::ZERO;
    (0..count)
        .map(|i| {
            if i > 0 {
                offset += if i % workers == 0 { batch_pause } else { item_pause };
            }
            offset
        })
        .collect()
}

/// Service for processing a batch of selected entries.
pub struct DownloadService {
    processor: Arc<dyn EntryProcessor>,
    config: DownloadConfig,
}

impl DownloadService {
    pub fn new(processor: Arc<dyn EntryProcessor>, config: DownloadConfig) -> Self {
        Self { processor, config }
    }

    /// Process `entries` and report outcomes in completion order.
    ///
    /// When the browser turns out to be unavailable no further entry is
    /// started. Entries already running still finish and keep their outcomes;
    /// the rest are listed in [`BatchReport::skipped`].
    pub async fn run(
        &self,
        entries: Vec<ListingEntry>,
        event_tx: mpsc::Sender<DownloadEvent>,
    ) -> BatchReport {
        let total = entries.len();
        let workers = self.config.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let schedule = pacing_schedule(
            total,
            workers,
            self.config.batch_pause,
            self.config.item_pause,
        );
        info!("Processing {} entries with {} workers", total, workers);

        let start = Instant::now();
        let halted = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for (index, (entry, offset)) in entries.into_iter().zip(schedule).enumerate() {
            let processor = self.processor.clone();
            let semaphore = semaphore.clone();
            let event_tx = event_tx.clone();
            let halted = halted.clone();

            tasks.spawn(async move {
                tokio::time::sleep_until(start + offset).await;
                let _permit = semaphore.acquire_owned().await;
                if halted.load(Ordering::SeqCst) {
                    return (index, entry, None);
                }

                let _ = event_tx
                    .send(DownloadEvent::Started {
                        index,
                        title: entry.title.clone(),
                    })
                    .await;
                debug!("Worker picked up {}", entry.link);

                // A panicking entry must still produce an outcome.
                let result = AssertUnwindSafe(processor.process(&entry))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        error!("Worker for {} panicked", entry.link);
                        Ok(DownloadOutcome::failure(
                            "failed: worker panicked",
                            entry.title.clone(),
                        ))
                    });
                // Set before the permit is released so queued entries see it.
                if matches!(result, Err(SessionError::Unavailable(_))) {
                    halted.store(true, Ordering::SeqCst);
                }
                (index, entry, Some(result))
            });
        }

        let mut report = BatchReport::default();
        let mut completed = 0;

        while let Some(joined) = tasks.join_next().await {
            let (index, entry, outcome) = match joined {
                Ok((index, entry, Some(Ok(outcome)))) => (index, entry, outcome),
                Ok((_, entry, Some(Err(e @ SessionError::Unavailable(_))))) => {
                    error!("Halting batch at {}: {}", entry.link, e);
                    report.skipped.push(entry);
                    report.fatal.get_or_insert(e);
                    continue;
                }
                Ok((index, entry, Some(Err(e)))) => {
                    warn!("Entry {} failed: {}", entry.link, e);
                    let outcome =
                        DownloadOutcome::failure(format!("failed: {}", e), entry.title.clone());
                    (index, entry, outcome)
                }
                Ok((_, entry, None)) => {
                    debug!("Skipped {} after the batch halted", entry.link);
                    report.skipped.push(entry);
                    continue;
                }
                Err(e) => {
                    error!("Worker task failed: {}", e);
                    continue;
                }
            };

            completed += 1;
            let _ = event_tx
                .send(DownloadEvent::Completed {
                    index,
                    completed,
                    total,
                    outcome: outcome.clone(),
                })
                .await;
            report.outcomes.push((entry, outcome));
        }

        info!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            report.succeeded(),
            report.failed(),
            report.skipped.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entries(n: usize) -> Vec<ListingEntry> {
        (0..n)
            .map(|i| {
                ListingEntry::new(
                    format!("Item {}", i),
                    NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                    format!("https://site/item/{}", i),
                )
            })
            .collect()
    }

    fn config(workers: usize) -> DownloadConfig {
        DownloadConfig {
            workers,
            batch_pause: Duration::from_millis(30),
            item_pause: Duration::from_millis(10),
        }
    }

    /// Tracks how many entries run at once.
    #[derive(Default)]
    struct CountingProcessor {
        active: AtomicUsize,
        peak: AtomicUsize,
        fail_link: Option<String>,
    }

    #[async_trait]
    impl EntryProcessor for CountingProcessor {
        async fn process(&self, entry: &ListingEntry) -> Result<DownloadOutcome, SessionError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.fail_link.as_deref() == Some(entry.link.as_str()) {
                return Ok(DownloadOutcome::failure("failed: nope", entry.title.clone()));
            }
            Ok(DownloadOutcome::success("downloaded", entry.title.clone()))
        }
    }

    #[test]
    fn test_pacing_schedule() {
        let s = pacing_schedule(5, 2, Duration::from_secs(3), Duration::from_secs(1));
        let secs: Vec<u64> = s.iter().map(|d| d.as_secs()).collect();
        // i=1 item, i=2 batch, i=3 item, i=4 batch
        assert_eq!(secs, vec![0, 1, 4, 5, 8]);
        assert!(pacing_schedule(0, 2, Duration::ZERO, Duration::ZERO).is_empty());
        assert_eq!(
            pacing_schedule(3, 0, Duration::from_secs(3), Duration::from_secs(1)).len(),
            3
        );
    }

    #[tokio::test]
    async fn test_every_entry_gets_an_outcome() {
        let processor = Arc::new(CountingProcessor {
            fail_link: Some("https://site/item/1".to_string()),
            ..Default::default()
        });
        let service = DownloadService::new(processor.clone(), config(2));
        let (tx, mut rx) = mpsc::channel(64);

        let report = service.run(entries(5), tx).await;
        assert_eq!(report.outcomes.len(), 5);
        assert_eq!(report.succeeded(), 4);
        assert_eq!(report.failed(), 1);
        assert!(processor.peak.load(Ordering::SeqCst) <= 2);

        let mut last_completed = 0;
        let mut started = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                DownloadEvent::Started { .. } => started += 1,
                DownloadEvent::Completed {
                    completed, total, ..
                } => {
                    assert_eq!(total, 5);
                    assert_eq!(completed, last_completed + 1);
                    last_completed = completed;
                }
            }
        }
        assert_eq!(started, 5);
        assert_eq!(last_completed, 5);
    }

    /// Fails one link with a given error; every other entry runs to the end.
    struct ScriptedProcessor {
        error_link: String,
        error: fn() -> SessionError,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ScriptedProcessor {
        fn new(error_link: &str, error: fn() -> SessionError) -> Self {
            Self {
                error_link: error_link.to_string(),
                error,
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EntryProcessor for ScriptedProcessor {
        async fn process(&self, entry: &ListingEntry) -> Result<DownloadOutcome, SessionError> {
            if entry.link == self.error_link {
                // Fail only once another entry is running.
                while self.started.load(Ordering::SeqCst) == 0 {
                    tokio::task::yield_now().await;
                }
                return Err((self.error)());
            }
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(DownloadOutcome::success("downloaded", entry.title.clone()))
        }
    }

    fn unpaced(workers: usize) -> DownloadConfig {
        DownloadConfig {
            workers,
            batch_pause: Duration::ZERO,
            item_pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_page_error_fails_only_its_entry() {
        let processor = Arc::new(ScriptedProcessor::new("https://site/item/1", || {
            SessionError::Script("new_page failed".to_string())
        }));
        let service = DownloadService::new(processor.clone(), unpaced(2));
        let (tx, _rx) = mpsc::channel(64);

        let report = service.run(entries(3), tx).await;
        assert!(report.fatal.is_none());
        assert!(report.skipped.is_empty());
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(processor.finished.load(Ordering::SeqCst), 2);

        let (_, failed) = report
            .outcomes
            .iter()
            .find(|(entry, _)| entry.link == "https://site/item/1")
            .unwrap();
        assert!(!failed.success);
        assert!(failed.message.contains("new_page failed"));
    }

    #[tokio::test]
    async fn test_unavailable_browser_halts_without_cancelling() {
        let processor = Arc::new(ScriptedProcessor::new("https://site/item/0", || {
            SessionError::Unavailable("no chrome".to_string())
        }));
        let service = DownloadService::new(processor.clone(), unpaced(2));
        let (tx, _rx) = mpsc::channel(64);

        let report = service.run(entries(4), tx).await;
        assert!(matches!(report.fatal, Some(SessionError::Unavailable(_))));
        assert_eq!(report.outcomes.len() + report.skipped.len(), 4);
        assert!(report
            .skipped
            .iter()
            .any(|entry| entry.link == "https://site/item/0"));

        // Whatever was running when the batch halted ran to completion.
        let started = processor.started.load(Ordering::SeqCst);
        assert!(started >= 1);
        assert_eq!(processor.finished.load(Ordering::SeqCst), started);
        assert_eq!(report.outcomes.len(), started);
        assert!(report.outcomes.iter().all(|(_, o)| o.success));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let service = DownloadService::new(Arc::new(CountingProcessor::default()), config(2));
        let (tx, _rx) = mpsc::channel(4);
        let report = service.run(Vec::new(), tx).await;
        assert!(report.outcomes.is_empty());
        assert!(report.fatal.is_none());
    }
}

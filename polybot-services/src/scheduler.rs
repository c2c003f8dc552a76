//! Update Scheduler
//!
//! Drives the poll cycle: fetch the catalog snapshot, fetch the reference
//! book for each market, merge into the state table, notify subscribers,
//! sleep, repeat. A failed cycle is logged and the loop still sleeps before
//! the next one, so transient venue errors never end the loop.
//!
//! At most one cycle task exists at a time. `stop()` aborts it and waits for
//! it to finish; merges are synchronous so an abort never lands mid-record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use polybot_core::{BookSource, CatalogSource, FetchResult};

use crate::config::IngestConfig;
use crate::fetcher::{fetch_book_or_none, fetch_snapshot};
use crate::notifier::SubscriberNotifier;
use crate::state_table::MarketStateTable;

/// Configuration for the update scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between cycles, regardless of cycle duration or outcome
    pub update_interval: Duration,
    /// Maximum catalog records per cycle
    pub max_markets: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(1),
            max_markets: 100,
        }
    }
}

impl From<&IngestConfig> for SchedulerConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            update_interval: config.update_interval,
            max_markets: config.max_markets,
        }
    }
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Counts from one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub merged: usize,
    pub rejected: usize,
    /// Markets merged without book data
    pub missing_books: usize,
}

/// How the last cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    Failed { error: String },
}

/// Point-in-time scheduler status for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<CycleOutcome>,
}

#[derive(Debug, Default)]
struct CycleMetrics {
    completed: AtomicU64,
    failed: AtomicU64,
    last: RwLock<Option<(DateTime<Utc>, CycleOutcome)>>,
}

impl CycleMetrics {
    fn record(&self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Completed(_) => self.completed.fetch_add(1, Ordering::SeqCst),
            CycleOutcome::Failed { .. } => self.failed.fetch_add(1, Ordering::SeqCst),
        };
        *self.last.write() = Some((Utc::now(), outcome));
    }
}

/// Everything a cycle needs, shared with the spawned loop task
struct CycleRunner {
    catalog: Arc<dyn CatalogSource>,
    books: Arc<dyn BookSource>,
    table: Arc<MarketStateTable>,
    notifier: Arc<SubscriberNotifier>,
    config: SchedulerConfig,
    metrics: CycleMetrics,
}

impl CycleRunner {
    async fn run_cycle(&self) -> FetchResult<CycleReport> {
        let entries = fetch_snapshot(self.catalog.as_ref(), self.config.max_markets).await?;
        let mut report = CycleReport {
            fetched: entries.len(),
            ..CycleReport::default()
        };

        // Catalog order is preserved through to the merges
        for entry in entries {
            let keys = match entry.validate() {
                Ok(keys) => keys,
                Err(e) => {
                    warn!("Skipping catalog entry: {}", e);
                    report.rejected += 1;
                    continue;
                }
            };

            let book =
                fetch_book_or_none(self.books.as_ref(), &keys.market_id, &keys.token_ids[0]).await;
            if book.is_none() {
                report.missing_books += 1;
            }

            match self.table.merge(entry, book.as_ref()) {
                Ok(record) => {
                    report.merged += 1;
                    self.notifier.notify_all(&record).await;
                }
                Err(e) => {
                    warn!("Skipping catalog entry: {}", e);
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }

    async fn run_and_record(&self) -> CycleOutcome {
        let outcome = match self.run_cycle().await {
            Ok(report) => {
                info!(
                    "Successfully updated {} of {} markets ({} rejected, {} without book)",
                    report.merged, report.fetched, report.rejected, report.missing_books
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                error!("Error in market update cycle: {}", e);
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.metrics.record(outcome.clone());
        outcome
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            self.run_and_record().await;
            debug!("Next market update in {:?}", self.config.update_interval);
            tokio::time::sleep(self.config.update_interval).await;
        }
    }
}

/// Fixed-interval poll loop over the catalog and book sources
pub struct UpdateScheduler {
    runner: Arc<CycleRunner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        books: Arc<dyn BookSource>,
        table: Arc<MarketStateTable>,
        notifier: Arc<SubscriberNotifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            runner: Arc::new(CycleRunner {
                catalog,
                books,
                table,
                notifier,
                config,
                metrics: CycleMetrics::default(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Spawn the cycle task. Returns `false` (and does nothing) if already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Market data scheduler is already running");
            return false;
        }

        info!(
            "Starting market data scheduler ({:?} interval, max {} markets)",
            self.runner.config.update_interval, self.runner.config.max_markets
        );
        let runner = Arc::clone(&self.runner);
        *task = Some(tokio::spawn(runner.run_loop()));
        true
    }

    /// Cancel the cycle task and wait for it to terminate
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;

        let Some(handle) = task.take() else {
            return;
        };

        info!("Stopping market data scheduler...");
        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => info!("Market update loop cancelled"),
            Err(e) => error!("Market update loop ended abnormally: {}", e),
        }
        info!("Market data scheduler stopped");
    }

    /// Run a single cycle inline, outside the background loop
    pub async fn run_once(&self) -> CycleOutcome {
        self.runner.run_and_record().await
    }

    pub async fn state(&self) -> SchedulerState {
        match self.task.lock().await.as_ref() {
            Some(handle) if !handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state().await;
        let metrics = &self.runner.metrics;
        let last = metrics.last.read().clone();

        SchedulerStatus {
            state,
            cycles_completed: metrics.completed.load(Ordering::SeqCst),
            cycles_failed: metrics.failed.load(Ordering::SeqCst),
            last_cycle_at: last.as_ref().map(|(at, _)| *at),
            last_outcome: last.map(|(_, outcome)| outcome),
        }
    }
}

//! Concurrent odds fetching.
//!
//! A fixed pool of workers drains a shared queue of race ids. Each worker
//! renders the odds page, parses it and sends a `FetchOutcome` to a single
//! collector, so one race failing never affects its siblings. A stop signal
//! (Ctrl-C or the batch deadline) prevents new items from starting and
//! abandons in-flight ones; outcomes already collected are kept.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::odds::parse_odds;
use crate::config::{SchedulerConfig, SourcesConfig};
use crate::http::PageFetcher;
use crate::types::{FailedRace, FailureKind, FetchOutcome, OddsRecord, RaceId};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything a batch produced. `records` has no defined order.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub records: Vec<OddsRecord>,
    pub failures: Vec<FailedRace>,
    /// Races never finished because the batch was stopped.
    pub unfinished: Vec<RaceId>,
}

impl FetchReport {
    pub fn was_interrupted(&self) -> bool {
        !self.unfinished.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Stop signal
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct StopSignal {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl StopSignal {
    fn is_stopped(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once cancellation is requested or the deadline passes.
    async fn stopped(&mut self) {
        let deadline = self.deadline;
        let cancel = &mut self.cancel;

        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        let signal = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // Sender gone: cancellation can no longer be requested.
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = timer => {}
            _ = signal => {}
        }
    }
}

enum WorkerEvent {
    Finished(FetchOutcome),
    Abandoned(RaceId),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct Worker {
    fetcher: Arc<dyn PageFetcher>,
    sources: SourcesConfig,
    row_selector: String,
    timeout: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
}

pub struct FetchScheduler {
    worker: Arc<Worker>,
    workers: usize,
    deadline: Option<Duration>,
}

impl FetchScheduler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        sources: SourcesConfig,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            worker: Arc::new(Worker {
                fetcher,
                sources,
                row_selector: config.odds_row_selector.clone(),
                timeout: config.fetch_timeout(),
                max_attempts: config.max_attempts.max(1),
                retry_backoff: config.retry_backoff(),
            }),
            workers: config.workers.max(1),
            deadline: config.deadline(),
        }
    }

    /// Fetch odds for every race in `race_ids`.
    ///
    /// Never fails: per-race problems land in `FetchReport::failures`.
    pub async fn fetch_all(
        &self,
        race_ids: impl IntoIterator<Item = RaceId>,
        cancel: watch::Receiver<bool>,
    ) -> FetchReport {
        let queue: VecDeque<RaceId> = race_ids.into_iter().collect();
        let total = queue.len();
        let mut report = FetchReport::default();

        if total == 0 {
            return report;
        }

        let pool = self.workers.min(total);
        info!(races = total, workers = pool, "Fetching odds");

        let queue = Arc::new(Mutex::new(queue));
        let stop = StopSignal {
            cancel,
            deadline: self.deadline.map(|d| Instant::now() + d),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut tasks = JoinSet::new();
        for worker_id in 0..pool {
            tasks.spawn(run_worker(
                worker_id,
                self.worker.clone(),
                queue.clone(),
                tx.clone(),
                stop.clone(),
            ));
        }
        drop(tx);

        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Finished(FetchOutcome::Success(record)) => {
                    report.records.push(record);
                }
                WorkerEvent::Finished(FetchOutcome::Failure(failure)) => {
                    report.failures.push(failure);
                }
                WorkerEvent::Abandoned(race_id) => report.unfinished.push(race_id),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Odds worker crashed");
            }
        }

        report.unfinished.extend(queue.lock().await.drain(..));

        if report.was_interrupted() {
            warn!(unfinished = report.unfinished.len(), "Odds batch stopped early");
        }
        info!(
            fetched = report.records.len(),
            failed = report.failures.len(),
            unfinished = report.unfinished.len(),
            "Odds batch complete"
        );

        report
    }
}

async fn run_worker(
    worker_id: usize,
    worker: Arc<Worker>,
    queue: Arc<Mutex<VecDeque<RaceId>>>,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    mut stop: StopSignal,
) {
    loop {
        if stop.is_stopped() {
            break;
        }
        let Some(race_id) = queue.lock().await.pop_front() else {
            break;
        };

        let event = tokio::select! {
            biased;
            outcome = worker.fetch_with_retry(race_id) => WorkerEvent::Finished(outcome),
            _ = stop.stopped() => {
                warn!(worker_id, %race_id, "Abandoning in-flight odds fetch");
                WorkerEvent::Abandoned(race_id)
            }
        };

        let abandoned = matches!(event, WorkerEvent::Abandoned(_));
        if tx.send(event).is_err() || abandoned {
            break;
        }
    }
    debug!(worker_id, "Odds worker finished");
}

impl Worker {
    async fn fetch_with_retry(&self, race_id: RaceId) -> FetchOutcome {
        let mut attempt = 1;
        loop {
            match self.fetch_once(race_id).await {
                Ok(record) => {
                    debug!(%race_id, runners = record.odds.len(), attempt, "Odds fetched");
                    return FetchOutcome::Success(record);
                }
                Err((kind, reason)) if kind.is_retryable() && attempt < self.max_attempts => {
                    debug!(%race_id, attempt, %kind, reason = %reason, "Odds fetch failed, retrying");
                    attempt += 1;
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
                Err((kind, reason)) => {
                    warn!(%race_id, attempts = attempt, %kind, reason = %reason, "Odds fetch failed");
                    return FetchOutcome::Failure(FailedRace {
                        race_id,
                        kind,
                        reason,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn fetch_once(&self, race_id: RaceId) -> Result<OddsRecord, (FailureKind, String)> {
        let url = self.sources.odds_url_for(&race_id);
        let html = self
            .fetcher
            .fetch(&url, self.timeout)
            .await
            .map_err(|e| (e.failure_kind(), e.to_string()))?;
        let odds = parse_odds(&html, &self.row_selector)
            .map_err(|e| (FailureKind::Parse, e.to_string()))?;
        Ok(OddsRecord { race_id, odds })
    }
}

//! Run orchestration: dates → active tracks → race ids → odds.
//!
//! Discovery is sequential; only the odds batch fans out. The set of race
//! ids handed to the scheduler is exactly the union of enumerations over
//! every (track, date) pair the resolver found active.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::discovery::{date_range, RaceIdEnumerator, TrackActivityResolver};
use crate::engine::scheduler::FetchScheduler;
use crate::tracks::TrackTable;
use crate::types::{FailedRace, OddsRecord, RaceId};

/// Everything one run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dates: Vec<NaiveDate>,
    /// Active (track, date) pairs.
    pub active_tracks: usize,
    /// Discovered race ids, ascending.
    pub races: Vec<RaceId>,
    pub records: Vec<OddsRecord>,
    pub failures: Vec<FailedRace>,
    pub unfinished: Vec<RaceId>,
}

impl RunReport {
    /// Records sorted by race id, for stable output.
    pub fn sorted_records(&self) -> Vec<OddsRecord> {
        let mut records = self.records.clone();
        records.sort_by_key(|r| r.race_id);
        records
    }
}

pub struct Pipeline {
    tracks: TrackTable,
    resolver: TrackActivityResolver,
    enumerator: RaceIdEnumerator,
    scheduler: FetchScheduler,
}

impl Pipeline {
    pub fn new(
        tracks: TrackTable,
        resolver: TrackActivityResolver,
        enumerator: RaceIdEnumerator,
        scheduler: FetchScheduler,
    ) -> Self {
        Self {
            tracks,
            resolver,
            enumerator,
            scheduler,
        }
    }

    /// Discover race ids for every date. Returns the ids and the number of
    /// active (track, date) pairs. Stops between tracks once cancelled.
    pub async fn discover(
        &self,
        dates: &[NaiveDate],
        cancel: &watch::Receiver<bool>,
    ) -> (BTreeSet<RaceId>, usize) {
        let mut races = BTreeSet::new();
        let mut active = 0;

        'dates: for &date in dates {
            for track in self.tracks.iter() {
                if *cancel.borrow() {
                    warn!(%date, "Discovery cancelled");
                    break 'dates;
                }

                if !self.resolver.is_active(track, date).await {
                    debug!(track = %track.code, %date, "Track inactive");
                    continue;
                }
                active += 1;

                races.extend(self.enumerator.enumerate(track, date).await);
            }
        }

        (races, active)
    }

    /// Full run from a base date over `horizon` days.
    pub async fn run(
        &self,
        base: NaiveDate,
        horizon: u32,
        cancel: watch::Receiver<bool>,
    ) -> RunReport {
        let dates = date_range(base, horizon);
        info!(base = %base, horizon, tracks = self.tracks.len(), "Starting discovery");

        let (races, active_tracks) = self.discover(&dates, &cancel).await;
        let races: Vec<RaceId> = races.into_iter().collect();

        let mut report = RunReport {
            dates,
            active_tracks,
            races,
            ..RunReport::default()
        };

        if report.races.is_empty() {
            warn!("No races discovered");
            log_summary(&report);
            return report;
        }

        let fetched = self
            .scheduler
            .fetch_all(report.races.iter().copied(), cancel)
            .await;
        report.records = fetched.records;
        report.failures = fetched.failures;
        report.unfinished = fetched.unfinished;

        log_summary(&report);
        report
    }
}

fn log_summary(report: &RunReport) {
    for failure in &report.failures {
        warn!(
            race_id = %failure.race_id,
            kind = %failure.kind,
            attempts = failure.attempts,
            reason = %failure.reason,
            "Odds not fetched"
        );
    }
    info!(
        dates = report.dates.len(),
        active_tracks = report.active_tracks,
        races = report.races.len(),
        records = report.records.len(),
        failures = report.failures.len(),
        unfinished = report.unfinished.len(),
        "Run complete"
    );
}

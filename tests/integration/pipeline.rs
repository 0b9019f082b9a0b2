//! End-to-end runs of discovery plus odds collection over a scripted
//! race day.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;

use raceodds::config::{DiscoveryConfig, SchedulerConfig, SourcesConfig};
use raceodds::discovery::{RaceIdEnumerator, TrackActivityResolver};
use raceodds::engine::pipeline::{Pipeline, RunReport};
use raceodds::engine::scheduler::FetchScheduler;
use raceodds::storage;
use raceodds::tracks::TrackTable;
use raceodds::types::{FailureKind, Track};

use crate::mock_fetcher::{RaceDay, Role, StubFetcher};

struct Harness {
    pipeline: Pipeline,
    direct: Arc<StubFetcher>,
    proxied: Arc<StubFetcher>,
    renderer: Arc<StubFetcher>,
}

fn harness(day: RaceDay, tracks: TrackTable, workers: usize) -> Harness {
    let day = Arc::new(day);
    let direct = Arc::new(StubFetcher::new(Role::Direct, day.clone()));
    let proxied = Arc::new(StubFetcher::new(Role::Proxied, day.clone()));
    let renderer = Arc::new(StubFetcher::new(Role::Renderer, day));

    let sources = SourcesConfig::default();
    let scheduler = SchedulerConfig {
        workers,
        retry_backoff_ms: 0,
        ..SchedulerConfig::default()
    };

    let pipeline = Pipeline::new(
        tracks,
        TrackActivityResolver::new(direct.clone(), proxied.clone(), sources.clone()),
        RaceIdEnumerator::new(proxied.clone(), sources.clone(), &DiscoveryConfig::default()),
        FetchScheduler::new(renderer.clone(), sources, &scheduler),
    );

    Harness {
        pipeline,
        direct,
        proxied,
        renderer,
    }
}

fn all_tracks() -> TrackTable {
    TrackTable::load("tracks.toml").unwrap()
}

fn may22() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 22).unwrap()
}

async fn run(h: &Harness, horizon: u32) -> RunReport {
    let (_tx, rx) = watch::channel(false);
    h.pipeline.run(may22(), horizon, rx).await
}

fn ids(report: &RunReport) -> Vec<String> {
    report.races.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_single_track_day() {
    let day = RaceDay::default().with_listed("10").with_races("39", 11);
    let h = harness(day, all_tracks(), 8);

    let report = run(&h, 1).await;

    let expected: Vec<String> = (1..=11).map(|r| format!("2025390522{r:02}")).collect();
    assert_eq!(ids(&report), expected);
    assert_eq!(report.active_tracks, 1);
    assert_eq!(report.records.len(), 11);
    assert!(report.failures.is_empty());
    assert!(report.unfinished.is_empty());

    // Probed 1..=12 and stopped at the first missing card.
    assert_eq!(h.proxied.calls_containing("shutuba"), 12);
    assert_eq!(h.renderer.calls().len(), 11);
    assert_eq!(h.direct.calls().len(), all_tracks().len());
}

#[tokio::test]
async fn test_listed_track_never_hits_mirror() {
    let day = RaceDay::default().with_listed("10").with_races("39", 3);
    let tracks = TrackTable::from_tracks(vec![Track::new("10", 39)]);
    let h = harness(day, tracks, 2);

    let report = run(&h, 1).await;

    assert_eq!(report.races.len(), 3);
    assert_eq!(h.proxied.calls_containing("race_list_sub"), 0);
}

#[tokio::test]
async fn test_primary_outage_falls_back_to_mirror() {
    let day = RaceDay::default()
        .with_primary_down("05")
        .with_mirror_id("202538052201")
        .with_mirror_id("202538052202")
        .with_races("38", 2);
    let h = harness(day, all_tracks(), 4);

    let report = run(&h, 1).await;

    assert_eq!(report.active_tracks, 1);
    assert_eq!(ids(&report), vec!["202538052201", "202538052202"]);
    assert_eq!(report.records.len(), 2);
    assert!(h.proxied.calls_containing("race_list_sub") >= 1);
}

#[tokio::test]
async fn test_one_broken_race_is_isolated() {
    let day = RaceDay::default()
        .with_listed("10")
        .with_races("39", 11)
        .with_broken_odds("202539052205");
    let h = harness(day, all_tracks(), 4);

    let report = run(&h, 1).await;

    assert_eq!(report.races.len(), 11);
    assert_eq!(report.records.len(), 10);
    assert_eq!(report.failures.len(), 1);

    let failure = &report.failures[0];
    assert_eq!(failure.race_id.to_string(), "202539052205");
    assert_eq!(failure.kind, FailureKind::Network);
    assert_eq!(failure.attempts, SchedulerConfig::default().max_attempts);
    assert!(report
        .records
        .iter()
        .all(|r| r.race_id.to_string() != "202539052205"));
}

#[tokio::test]
async fn test_reruns_are_identical() {
    let day = RaceDay::default()
        .with_listed("10")
        .with_listed("11")
        .with_races("39", 6)
        .with_races("40", 9);

    let first = run(&harness(day.clone(), all_tracks(), 8), 1).await;
    let second = run(&harness(day, all_tracks(), 3), 1).await;

    assert_eq!(first.races, second.races);
    assert_eq!(first.sorted_records(), second.sorted_records());
    assert_eq!(first.records.len(), 15);
}

#[tokio::test]
async fn test_horizon_covers_each_day() {
    let day = RaceDay::default().with_listed("10").with_races("39", 2);
    let tracks = TrackTable::from_tracks(vec![Track::new("10", 39)]);
    let h = harness(day, tracks, 2);

    let report = run(&h, 2).await;

    assert_eq!(report.dates.len(), 2);
    // The scripted day keys races by venue only, so both dates race.
    assert_eq!(
        ids(&report),
        vec!["202539052201", "202539052202", "202539052301", "202539052302"]
    );
}

#[tokio::test]
async fn test_run_writes_csv() {
    let day = RaceDay::default().with_listed("10").with_races("39", 2);
    let tracks = TrackTable::from_tracks(vec![Track::new("10", 39)]);
    let h = harness(day, tracks, 2);
    let report = run(&h, 1).await;

    let mut dir = std::env::temp_dir();
    dir.push(format!("raceodds_it_{}", uuid::Uuid::new_v4()));
    let path = storage::output_path(&dir, may22());

    tokio_test::assert_ok!(storage::write_odds_csv(&report.records, &path));

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("race_id,odds"));
    assert_eq!(
        lines.next(),
        Some("202539052201,1.1 2.1 3.1 4.1 5.1 6.1 7.1 8.1")
    );

    let back = tokio_test::assert_ok!(storage::read_odds_csv(&path));
    assert_eq!(back, report.sorted_records());

    std::fs::remove_dir_all(&dir).unwrap();
}

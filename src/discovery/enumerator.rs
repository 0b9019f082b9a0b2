//! Race-id enumeration for one active track and day.
//!
//! Races are numbered contiguously from 1, so probing stops at the first
//! race card that reports "not found". The probe is bounded by a hard cap
//! and also stops on the first fetch failure: an outage at race r almost
//! always affects r+1 onwards too.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DiscoveryConfig, SourcesConfig};
use crate::http::PageFetcher;
use crate::types::{FetchError, RaceId, Track};

/// Result of probing one race slot.
#[derive(Debug)]
enum Probe {
    Exists,
    NotFound,
    Failed(FetchError),
}

pub struct RaceIdEnumerator {
    fetcher: Arc<dyn PageFetcher>,
    sources: SourcesConfig,
    max_races: u8,
    not_found_markers: Vec<String>,
}

impl RaceIdEnumerator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        sources: SourcesConfig,
        discovery: &DiscoveryConfig,
    ) -> Self {
        Self {
            fetcher,
            sources,
            max_races: discovery.max_races,
            not_found_markers: discovery.not_found_markers.clone(),
        }
    }

    /// Race ids run at `track` on `date`, in race-number order.
    pub async fn enumerate(&self, track: &Track, date: NaiveDate) -> Vec<RaceId> {
        let mut ids = Vec::new();

        for race in 1..=self.max_races {
            let race_id = RaceId::new(track, date, race);
            match self.probe(&race_id).await {
                Probe::Exists => ids.push(race_id),
                Probe::NotFound => {
                    if race == 1 {
                        debug!(track = %track.code, %date, "No races at active track");
                    }
                    break;
                }
                Probe::Failed(e) => {
                    warn!(
                        track = %track.code,
                        %race_id,
                        error = %e,
                        "Race probe failed, stopping scan for this track"
                    );
                    break;
                }
            }
        }

        info!(track = %track.code, %date, races = ids.len(), "Track enumerated");
        ids
    }

    async fn probe(&self, race_id: &RaceId) -> Probe {
        let url = self.sources.race_card_url_for(race_id);
        match self.fetcher.fetch(&url, self.sources.probe_timeout()).await {
            Ok(body) if self.is_not_found(&body) => Probe::NotFound,
            Ok(_) => Probe::Exists,
            Err(FetchError::Status { status: 404, .. }) => Probe::NotFound,
            Err(e) => Probe::Failed(e),
        }
    }

    fn is_not_found(&self, body: &str) -> bool {
        self.not_found_markers.iter().any(|m| body.contains(m.as_str()))
    }
}

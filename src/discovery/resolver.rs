//! Track activity resolution.
//!
//! The official race list is authoritative but has partial outages, so a
//! mirror is consulted when it gives no answer. The mirror is never
//! queried once the primary has confirmed racing.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SourcesConfig;
use crate::http::PageFetcher;
use crate::types::Track;

/// Structural marker of a populated race list on the primary source.
const RACE_LIST_SELECTOR: &str = "table.RaceList_Table";

pub struct TrackActivityResolver {
    /// The primary source must not go through the proxy.
    direct: Arc<dyn PageFetcher>,
    proxied: Arc<dyn PageFetcher>,
    sources: SourcesConfig,
}

impl TrackActivityResolver {
    pub fn new(
        direct: Arc<dyn PageFetcher>,
        proxied: Arc<dyn PageFetcher>,
        sources: SourcesConfig,
    ) -> Self {
        Self {
            direct,
            proxied,
            sources,
        }
    }

    /// Whether `track` has racing on `date`. Fetch and parse failures
    /// count as "no evidence", never as errors.
    pub async fn is_active(&self, track: &Track, date: NaiveDate) -> bool {
        let url = self.sources.primary_url_for(track, date);
        match self.direct.fetch(&url, self.sources.primary_timeout()).await {
            Ok(body) if has_race_list(&body) => {
                debug!(track = %track.code, %date, "Primary source lists races");
                return true;
            }
            Ok(_) => {
                debug!(track = %track.code, %date, "Primary source has no race list");
            }
            Err(e) => {
                warn!(track = %track.code, %date, error = %e, "Primary source failed, trying fallback");
            }
        }

        let url = self.sources.fallback_url_for(date);
        match self.proxied.fetch(&url, self.sources.fallback_timeout()).await {
            Ok(body) => {
                let found = mentions_track_race(&body, track, date);
                debug!(track = %track.code, %date, found, "Fallback source checked");
                found
            }
            Err(e) => {
                warn!(track = %track.code, %date, error = %e, "Fallback source failed");
                false
            }
        }
    }
}

fn has_race_list(body: &str) -> bool {
    let Ok(selector) = Selector::parse(RACE_LIST_SELECTOR) else {
        return false;
    };
    Html::parse_document(body).select(&selector).next().is_some()
}

/// Look for a race id of this track and date in the mirror's page.
fn mentions_track_race(body: &str, track: &Track, date: NaiveDate) -> bool {
    let pattern = format!(
        r"race_id={:04}{:02}{:02}{:02}\d{{2}}",
        date.year(),
        track.venue,
        date.month(),
        date.day()
    );
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(body),
        Err(e) => {
            warn!(%pattern, error = %e, "Invalid race id pattern");
            false
        }
    }
}

//! Scripted network for integration testing.
//!
//! `RaceDay` describes which tracks race, how many races each runs and
//! which pages misbehave. `StubFetcher` serves one route (direct, proxied
//! or renderer) of that script and records every URL it was asked for.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use raceodds::http::PageFetcher;
use raceodds::types::FetchError;

pub const RACE_LIST: &str =
    "<html><body><table class=\"RaceList_Table\"><tr><td>1R</td></tr></table></body></html>";
pub const NO_RACES: &str = "<html><body><p>本日の開催はありません</p></body></html>";
pub const RACE_CARD: &str = "<html><body><table class=\"Shutuba_Table\"></table></body></html>";
pub const NOT_FOUND: &str = "<html><body><h1>404 Not Found</h1></body></html>";

/// Which route a stub serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Direct,
    Proxied,
    Renderer,
}

/// The state of the remote sites for one test.
#[derive(Debug, Clone, Default)]
pub struct RaceDay {
    /// Track codes whose primary race list shows racing.
    pub listed: HashSet<String>,
    /// Track codes whose primary race list fails outright.
    pub primary_down: HashSet<String>,
    /// Race ids mentioned by the fallback mirror.
    pub mirror_ids: Vec<String>,
    /// Races run per venue code.
    pub races: HashMap<String, u8>,
    /// Race ids whose odds page never loads.
    pub broken_odds: HashSet<String>,
}

impl RaceDay {
    pub fn with_listed(mut self, track: &str) -> Self {
        self.listed.insert(track.to_string());
        self
    }

    pub fn with_primary_down(mut self, track: &str) -> Self {
        self.primary_down.insert(track.to_string());
        self
    }

    pub fn with_mirror_id(mut self, race_id: &str) -> Self {
        self.mirror_ids.push(race_id.to_string());
        self
    }

    pub fn with_races(mut self, venue: &str, count: u8) -> Self {
        self.races.insert(venue.to_string(), count);
        self
    }

    pub fn with_broken_odds(mut self, race_id: &str) -> Self {
        self.broken_odds.insert(race_id.to_string());
        self
    }

    fn respond(&self, role: Role, url: &str) -> Result<String, FetchError> {
        match role {
            Role::Direct => {
                let track = query_param(url, "k_babaCode").unwrap_or_default();
                if self.primary_down.contains(track) {
                    Err(FetchError::Network {
                        url: url.to_string(),
                        reason: "connection reset by peer".into(),
                    })
                } else if self.listed.contains(track) {
                    Ok(RACE_LIST.to_string())
                } else {
                    Ok(NO_RACES.to_string())
                }
            }
            Role::Proxied if url.contains("race_list_sub") => {
                let links: String = self
                    .mirror_ids
                    .iter()
                    .map(|id| format!("<a href=\"/race/shutuba.html?race_id={id}\">R</a>"))
                    .collect();
                Ok(format!("<html><body>{links}</body></html>"))
            }
            Role::Proxied => {
                let race_id = query_param(url, "race_id").unwrap_or_default();
                if self.runs(race_id) {
                    Ok(RACE_CARD.to_string())
                } else {
                    Ok(NOT_FOUND.to_string())
                }
            }
            Role::Renderer => {
                let race_id = query_param(url, "race_id").unwrap_or_default();
                if self.broken_odds.contains(race_id) {
                    return Err(FetchError::Timeout { url: url.to_string() });
                }
                Ok(odds_page(race_id))
            }
        }
    }

    /// Race ids are `YYYY VV MM DD RR`.
    fn runs(&self, race_id: &str) -> bool {
        if race_id.len() != 12 {
            return false;
        }
        let venue = &race_id[4..6];
        let race: u8 = race_id[10..12].parse().unwrap_or(0);
        self.races.get(venue).is_some_and(|count| race >= 1 && race <= *count)
    }
}

/// A deterministic odds page: runner `n` is priced at `n + race / 10`.
pub fn odds_page(race_id: &str) -> String {
    let race: u8 = race_id.get(10..12).and_then(|r| r.parse().ok()).unwrap_or(0);
    let rows: String = (1..=8u8)
        .map(|post| {
            let odds = f64::from(post) + f64::from(race) / 10.0;
            format!("<tr><td>{post}</td><td>{odds:.1}</td></tr>")
        })
        .collect();
    format!("<html><body><table><tbody class=\"OddsTbody\">{rows}</tbody></table></body></html>")
}

fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// One route of a `RaceDay`.
pub struct StubFetcher {
    role: Role,
    day: Arc<RaceDay>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    pub fn new(role: Role, day: Arc<RaceDay>) -> Self {
        Self {
            role,
            day,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every URL requested so far, in request order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.day.respond(self.role, url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        let url = "https://example.com/list?k_babaCode=10&k_raceDate=2025/05/22";
        assert_eq!(query_param(url, "k_babaCode"), Some("10"));
        assert_eq!(query_param(url, "k_raceDate"), Some("2025/05/22"));
        assert_eq!(query_param(url, "race_id"), None);
        assert_eq!(query_param("https://example.com/", "race_id"), None);
    }

    #[tokio::test]
    async fn test_stub_records_calls() {
        let day = Arc::new(RaceDay::default().with_races("39", 2));
        let stub = StubFetcher::new(Role::Proxied, day);

        let card = stub
            .fetch("https://x/shutuba.html?race_id=202539052202", Duration::from_secs(1))
            .await
            .unwrap();
        let missing = stub
            .fetch("https://x/shutuba.html?race_id=202539052203", Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(card, RACE_CARD);
        assert_eq!(missing, NOT_FOUND);
        assert_eq!(stub.calls().len(), 2);
        assert_eq!(stub.calls_containing("race_id=2025390522"), 2);
    }

    #[test]
    fn test_odds_page_is_deterministic() {
        assert_eq!(odds_page("202539052203"), odds_page("202539052203"));
        assert!(odds_page("202539052203").contains("<td>1.3</td>"));
    }
}

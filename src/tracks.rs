//! Track code table.
//!
//! Maps the primary source's two-digit track codes to the venue codes used
//! by the fallback source and the race pages. Kept as a TOML data file so
//! tracks can be added without a rebuild:
//!
//! ```toml
//! [tracks]
//! "01" = "30"
//! "10" = "39"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::types::{RaceOddsError, Track};

#[derive(Debug, Deserialize)]
struct TrackFile {
    tracks: BTreeMap<String, String>,
}

/// The fixed set of tracks scanned each run, ordered by track code.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTable {
    tracks: Vec<Track>,
}

impl TrackTable {
    /// Load and validate the table from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read track table: {}", path.display()))?;
        let table = Self::from_toml(&contents)
            .with_context(|| format!("Failed to load track table: {}", path.display()))?;
        info!(path = %path.display(), tracks = table.len(), "Track table loaded");
        Ok(table)
    }

    /// Parse and validate table contents.
    pub fn from_toml(contents: &str) -> Result<Self, RaceOddsError> {
        let file: TrackFile =
            toml::from_str(contents).map_err(|e| RaceOddsError::TrackTable(e.to_string()))?;

        if file.tracks.is_empty() {
            return Err(RaceOddsError::TrackTable("no tracks defined".into()));
        }

        let tracks = file
            .tracks
            .into_iter()
            .map(|(code, venue)| {
                if !is_two_digits(&code) {
                    return Err(RaceOddsError::TrackTable(format!(
                        "track code '{code}' must be two digits"
                    )));
                }
                if !is_two_digits(&venue) {
                    return Err(RaceOddsError::TrackTable(format!(
                        "venue code '{venue}' for track {code} must be two digits"
                    )));
                }
                let venue = venue
                    .parse::<u8>()
                    .map_err(|e| RaceOddsError::TrackTable(e.to_string()))?;
                Ok(Track::new(code, venue))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tracks })
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn get(&self, code: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.code.as_str() == code)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn is_two_digits(s: &str) -> bool {
    s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit())
}

//! Shared types for the RACEODDS pipeline.
//!
//! These types form the data model used across discovery, fetching and
//! output. They carry no I/O so every layer can depend on them.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Two-digit code naming a physical track, as used by the primary source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackCode(String);

impl TrackCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A track paired with the venue code the fallback source and the race
/// pages use for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub code: TrackCode,
    /// Venue code embedded in race ids (`"30"` → 30).
    pub venue: u8,
}

impl Track {
    pub fn new(code: impl Into<String>, venue: u8) -> Self {
        Self {
            code: TrackCode::new(code),
            venue,
        }
    }

    /// Venue code zero-padded the way it appears in URLs and race ids.
    pub fn venue_code(&self) -> String {
        format!("{:02}", self.venue)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (venue {:02})", self.code, self.venue)
    }
}

// ---------------------------------------------------------------------------
// Race identifiers
// ---------------------------------------------------------------------------

/// Composite key locating one race at one track on one date.
///
/// Rendered as the 12-digit `YYYYVVMMDDRR` string the race pages use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RaceId {
    pub year: u16,
    pub venue: u8,
    pub month: u8,
    pub day: u8,
    pub race: u8,
}

impl RaceId {
    pub fn new(track: &Track, date: NaiveDate, race: u8) -> Self {
        Self {
            year: date.year() as u16,
            venue: track.venue,
            month: date.month() as u8,
            day: date.day() as u8,
            race,
        }
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}",
            self.year, self.venue, self.month, self.day, self.race
        )
    }
}

impl FromStr for RaceId {
    type Err = RaceOddsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 12 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RaceOddsError::InvalidRaceId(s.to_string()));
        }
        let field = |range: std::ops::Range<usize>| -> Result<u16, RaceOddsError> {
            s[range]
                .parse()
                .map_err(|_| RaceOddsError::InvalidRaceId(s.to_string()))
        };
        Ok(Self {
            year: field(0..4)?,
            venue: field(4..6)? as u8,
            month: field(6..8)? as u8,
            day: field(8..10)? as u8,
            race: field(10..12)? as u8,
        })
    }
}

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// Win odds for one race, in post-position order.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsRecord {
    pub race_id: RaceId,
    pub odds: Vec<f64>,
}

impl fmt::Display for OddsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} runners)", self.race_id, self.odds.len())
    }
}

/// Why a single race's odds could not be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, refused connection, non-2xx status.
    Network,
    /// The page loaded but the odds table was missing or malformed.
    Parse,
    /// The browser or driver could not be started.
    ResourceExhaustion,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::Parse)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network"),
            FailureKind::Parse => write!(f, "parse"),
            FailureKind::ResourceExhaustion => write!(f, "resource"),
        }
    }
}

/// A race whose odds fetch was given up on.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRace {
    pub race_id: RaceId,
    pub kind: FailureKind,
    pub reason: String,
    pub attempts: u32,
}

/// Result of one worker task. Failures travel as values, never as panics
/// or errors across task boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(OddsRecord),
    Failure(FailedRace),
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure of a single page fetch. The client reports it; callers decide
/// whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Browser unavailable: {0}")]
    Resource(String),
}

impl FetchError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            FetchError::Resource(_) => FailureKind::ResourceExhaustion,
            _ => FailureKind::Network,
        }
    }
}

/// Domain-specific error types for RACEODDS.
#[derive(Debug, thiserror::Error)]
pub enum RaceOddsError {
    #[error("Invalid base date '{0}': expected YYYYMMDD, 'today' or 'tomorrow'")]
    InvalidBaseDate(String),

    #[error("Invalid race id '{0}': expected 12 digits")]
    InvalidRaceId(String),

    #[error("Track table error: {0}")]
    TrackTable(String),

    #[error("Odds parse error: {0}")]
    OddsParse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

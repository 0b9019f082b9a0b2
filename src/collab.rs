//! Hand-off schema for downstream collaborators.
//!
//! The model scorer consumes odds records plus race-card rows and returns
//! one `ScoredEntry` per runner; the betting client takes a filtered
//! selection of those entries. Neither collaborator's internals live here.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::engine::executor::ExecutionReport;
use crate::types::{OddsRecord, RaceId};

/// One runner's row from a race card. Card assembly happens elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CardEntry {
    pub race_id: RaceId,
    /// 1-based post position (horse number).
    pub post_position: u8,
    /// Numeric feature columns, by name.
    pub features: Vec<(String, f64)>,
}

/// A runner with the scorer's verdict attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub race_id: RaceId,
    pub post_position: u8,
    pub features: Vec<(String, f64)>,
    /// Win odds at fetch time, when the odds record covers this runner.
    pub odds: Option<f64>,
    pub probability: f64,
    /// `probability * odds`; above 1.0 means a positive expected return.
    pub expected_return: Option<f64>,
}

/// Trained scoring function supplied from outside the pipeline.
pub trait Scorer: Send + Sync {
    fn score(&self, odds: &[OddsRecord], cards: &[CardEntry]) -> Result<Vec<ScoredEntry>>;
}

/// Execution client for a selection of scored entries.
#[async_trait]
pub trait BetClient: Send + Sync {
    /// `stake` is the amount per selected entry.
    async fn place_bets(
        &self,
        selection: &[ScoredEntry],
        stake: u32,
        dry_run: bool,
    ) -> Result<ExecutionReport>;
}

/// Index odds records for joining against card rows.
pub fn odds_index(records: &[OddsRecord]) -> HashMap<RaceId, &[f64]> {
    records
        .iter()
        .map(|r| (r.race_id, r.odds.as_slice()))
        .collect()
}

/// Win odds for a runner; odds are stored in post-position order.
pub fn odds_for(index: &HashMap<RaceId, &[f64]>, race_id: RaceId, post_position: u8) -> Option<f64> {
    let position = usize::from(post_position).checked_sub(1)?;
    index.get(&race_id)?.get(position).copied()
}

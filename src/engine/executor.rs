//! Bet executor.
//!
//! Receives the scorer's filtered selection. Live purchasing is handled by
//! an external client; this crate ships the dry-run executor, which logs
//! what would be bought and totals the stake.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::collab::{BetClient, ScoredEntry};
use crate::types::RaceId;

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Result of executing a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub placed: Vec<PlacedBet>,
    pub total_stake: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedBet {
    pub race_id: RaceId,
    pub post_position: u8,
    pub stake: u32,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct DryRunBetClient;

#[async_trait]
impl BetClient for DryRunBetClient {
    async fn place_bets(
        &self,
        selection: &[ScoredEntry],
        stake: u32,
        dry_run: bool,
    ) -> Result<ExecutionReport> {
        if !dry_run {
            anyhow::bail!("Live betting is not available in this build; rerun with dry-run");
        }

        let mut report = ExecutionReport {
            placed: Vec::with_capacity(selection.len()),
            total_stake: 0,
            dry_run,
        };

        for entry in selection {
            info!(
                race_id = %entry.race_id,
                post = entry.post_position,
                stake,
                probability = format!("{:.1}%", entry.probability * 100.0),
                odds = ?entry.odds,
                "[DRY RUN] Would place bet"
            );
            report.placed.push(PlacedBet {
                race_id: entry.race_id,
                post_position: entry.post_position,
                stake,
            });
            report.total_stake += u64::from(stake);
        }

        info!(
            bets = report.placed.len(),
            total_stake = report.total_stake,
            "Dry-run execution complete"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(post: u8) -> ScoredEntry {
        ScoredEntry {
            race_id: "202539052203".parse().unwrap(),
            post_position: post,
            features: Vec::new(),
            odds: Some(3.5),
            probability: 0.3,
            expected_return: Some(1.05),
        }
    }

    #[tokio::test]
    async fn test_dry_run_execution() {
        let report = DryRunBetClient
            .place_bets(&[entry(1), entry(4)], 100, true)
            .await
            .unwrap();

        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.total_stake, 200);
        assert!(report.dry_run);
        assert_eq!(report.placed[1].post_position, 4);
    }

    #[tokio::test]
    async fn test_empty_selection() {
        let report = DryRunBetClient.place_bets(&[], 100, true).await.unwrap();
        assert!(report.placed.is_empty());
        assert_eq!(report.total_stake, 0);
    }

    #[tokio::test]
    async fn test_live_mode_refused() {
        let result = DryRunBetClient.place_bets(&[entry(1)], 100, false).await;
        tokio_test::assert_err!(result);
    }
}

//! Persistence layer.
//!
//! Writes a run's odds records as CSV (`race_id,odds`, odds space-joined)
//! and reads them back for downstream consumers.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{OddsRecord, RaceId};

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct OddsRow {
    race_id: String,
    odds: String,
}

/// `{dir}/odds_{YYYYMMDD}.csv` for the run's base date.
pub fn output_path(dir: &Path, run_date: NaiveDate) -> PathBuf {
    dir.join(format!("odds_{}.csv", run_date.format("%Y%m%d")))
}

/// Write odds records sorted by race id. Creates the parent directory.
pub fn write_odds_csv(records: &[OddsRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }

    let mut sorted: Vec<&OddsRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.race_id);

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for record in sorted {
        let odds = record
            .odds
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        writer
            .serialize(OddsRow {
                race_id: record.race_id.to_string(),
                odds,
            })
            .with_context(|| format!("Failed to write row for {}", record.race_id))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    info!(path = %path.display(), records = records.len(), "Odds written");
    Ok(())
}

/// Read an odds CSV written by [`write_odds_csv`].
pub fn read_odds_csv(path: &Path) -> Result<Vec<OddsRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<OddsRow>().enumerate() {
        let row = row.with_context(|| format!("Bad row {} in {}", line + 1, path.display()))?;
        let race_id: RaceId = row.race_id.parse()?;
        let odds = row
            .odds
            .split_whitespace()
            .map(|t| {
                t.parse::<f64>()
                    .with_context(|| format!("Bad odds value '{t}' for {race_id}"))
            })
            .collect::<Result<Vec<_>>>()?;
        records.push(OddsRecord { race_id, odds });
    }

    debug!(path = %path.display(), records = records.len(), "Odds loaded");
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

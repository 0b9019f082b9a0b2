//! Base date parsing and date range expansion.

use chrono::{Duration, NaiveDate};

use crate::types::RaceOddsError;

/// Parse `today`, `tomorrow` or a literal `YYYYMMDD` relative to `today`.
pub fn parse_base_date(input: &str, today: NaiveDate) -> Result<NaiveDate, RaceOddsError> {
    match input.trim() {
        "today" => Ok(today),
        "tomorrow" => today
            .succ_opt()
            .ok_or_else(|| RaceOddsError::InvalidBaseDate(input.to_string())),
        literal if literal.len() == 8 && literal.bytes().all(|b| b.is_ascii_digit()) => {
            NaiveDate::parse_from_str(literal, "%Y%m%d")
                .map_err(|_| RaceOddsError::InvalidBaseDate(input.to_string()))
        }
        _ => Err(RaceOddsError::InvalidBaseDate(input.to_string())),
    }
}

/// `horizon` consecutive dates starting at `base`.
pub fn date_range(base: NaiveDate, horizon: u32) -> Vec<NaiveDate> {
    (0..horizon as i64)
        .map(|offset| base + Duration::days(offset))
        .collect()
}

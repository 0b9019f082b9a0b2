//! Win-odds extraction from a rendered odds page.

use scraper::{Html, Selector};

use crate::types::RaceOddsError;

/// Odds values in post-position order.
///
/// Each matching row reads as `post odds [post odds ...]` once its text is
/// split on whitespace; the values at odd positions are the odds.
pub fn parse_odds(html: &str, row_selector: &str) -> Result<Vec<f64>, RaceOddsError> {
    let selector = Selector::parse(row_selector).map_err(|e| {
        RaceOddsError::OddsParse(format!("invalid row selector '{row_selector}': {e:?}"))
    })?;

    let document = Html::parse_document(html);
    let mut rows = 0usize;
    let mut odds = Vec::new();

    for row in document.select(&selector) {
        rows += 1;
        let text = row.text().collect::<Vec<_>>().join(" ");
        for token in text.split_whitespace().skip(1).step_by(2) {
            let value: f64 = token.parse().map_err(|_| {
                RaceOddsError::OddsParse(format!("non-numeric odds value '{token}'"))
            })?;
            odds.push(value);
        }
    }

    if rows == 0 {
        return Err(RaceOddsError::OddsParse("odds table not found".into()));
    }
    if odds.is_empty() {
        return Err(RaceOddsError::OddsParse("odds table has no values".into()));
    }
    Ok(odds)
}

//! URL construction for each remote source.

use chrono::{Datelike, NaiveDate};

use crate::config::SourcesConfig;
use crate::types::{RaceId, Track};

fn fill_date(template: &str, date: NaiveDate) -> String {
    template
        .replace("{yyyy}", &format!("{:04}", date.year()))
        .replace("{mm}", &format!("{:02}", date.month()))
        .replace("{dd}", &format!("{:02}", date.day()))
}

impl SourcesConfig {
    /// Official race list for one track and day.
    pub fn primary_url_for(&self, track: &Track, date: NaiveDate) -> String {
        fill_date(&self.primary_url, date)
            .replace("{track}", track.code.as_str())
            .replace("{venue}", &track.venue_code())
    }

    /// Mirror's race list for every track on one day.
    pub fn fallback_url_for(&self, date: NaiveDate) -> String {
        fill_date(&self.fallback_url, date)
    }

    /// Race card page, used to probe whether a race exists.
    pub fn race_card_url_for(&self, race_id: &RaceId) -> String {
        self.race_card_url.replace("{race_id}", &race_id.to_string())
    }

    /// Win odds page for one race.
    pub fn odds_url_for(&self, race_id: &RaceId) -> String {
        self.odds_url.replace("{race_id}", &race_id.to_string())
    }
}

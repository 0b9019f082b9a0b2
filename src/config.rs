//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing file yields a working configuration.
//! The proxy URL may carry credentials, so it is referenced by env-var name
//! and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::types::RaceOddsError;

/// Race numbers render as two digits inside a race id.
const MAX_RACE_NUMBER: u8 = 99;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub sources: SourcesConfig,
    pub discovery: DiscoveryConfig,
    pub scheduler: SchedulerConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkConfig {
    pub user_agent: String,
    pub accept_language: String,
    /// Name of the env var holding the forward proxy URL.
    pub proxy_url_env: Option<String>,
    /// SQLite file backing the response cache. `None` keeps it in memory.
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/123.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "ja-JP,ja;q=0.9,en-US;q=0.8".to_string(),
            proxy_url_env: Some("RACEODDS_PROXY_URL".to_string()),
            cache_path: Some(PathBuf::from("data/http_cache.sqlite")),
            cache_ttl_secs: 3600,
        }
    }
}

/// URL templates for each remote source.
///
/// Placeholders: `{track}`, `{venue}`, `{yyyy}`, `{mm}`, `{dd}`, `{race_id}`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub primary_url: String,
    pub fallback_url: String,
    pub race_card_url: String,
    pub odds_url: String,
    pub primary_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://www2.keiba.go.jp/KeibaWeb/TodayRaceInfo/RaceList\
                          ?k_babaCode={track}&k_raceDate={yyyy}/{mm}/{dd}"
                .to_string(),
            fallback_url: "https://nar.netkeiba.com/top/race_list_sub.html\
                           ?kaisai_date={yyyy}{mm}{dd}"
                .to_string(),
            race_card_url: "https://nar.netkeiba.com/race/shutuba.html?race_id={race_id}"
                .to_string(),
            odds_url: "https://race.netkeiba.com/odds/index.html?type=win&race_id={race_id}"
                .to_string(),
            primary_timeout_secs: 10,
            fallback_timeout_secs: 10,
            probe_timeout_secs: 8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// TOML file mapping track codes to venue codes.
    pub track_table: PathBuf,
    /// Hard cap on race numbers probed per track and day.
    pub max_races: u8,
    /// Body substrings meaning "no such race".
    pub not_found_markers: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            track_table: PathBuf::from("tracks.toml"),
            max_races: 18,
            not_found_markers: vec![
                "404 Not Found".to_string(),
                "指定されたページは存在しません".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub workers: usize,
    /// Total attempts per race, first try included.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Page-load timeout for one odds fetch.
    pub fetch_timeout_secs: u64,
    /// Wall-clock budget for the whole odds batch.
    pub deadline_secs: Option<u64>,
    /// How long the browser waits for the odds rows to render.
    pub render_wait_secs: u64,
    pub odds_row_selector: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_attempts: 2,
            retry_backoff_ms: 1000,
            fetch_timeout_secs: 30,
            deadline_secs: None,
            render_wait_secs: 15,
            odds_row_selector: ".OddsTbody tr".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/output"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Reject values that would produce malformed race ids.
    pub fn validate(&self) -> Result<(), RaceOddsError> {
        if self.discovery.max_races == 0 || self.discovery.max_races > MAX_RACE_NUMBER {
            return Err(RaceOddsError::Config(format!(
                "discovery.max_races must be between 1 and {MAX_RACE_NUMBER}, got {}",
                self.discovery.max_races
            )));
        }
        Ok(())
    }

    /// Load configuration, falling back to defaults when the file is absent.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The forward proxy URL, if one is configured and set in the environment.
    pub fn proxy_url(&self) -> Option<SecretString> {
        let env_name = self.network.proxy_url_env.as_deref()?;
        match Self::resolve_env(env_name) {
            Ok(url) if !url.trim().is_empty() => Some(SecretString::new(url)),
            _ => None,
        }
    }
}

impl SourcesConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn render_wait(&self) -> Duration {
        Duration::from_secs(self.render_wait_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// Proxy URL without credentials (scheme, host and port). Safe to log and
/// to hand to processes that only need the endpoint.
pub fn proxy_endpoint(url: &SecretString) -> String {
    let raw = url.expose_secret();
    let (scheme, rest) = raw.split_once("://").unwrap_or(("http", raw.as_str()));
    let host = rest.rsplit('@').next().unwrap_or(rest);
    format!("{scheme}://{host}")
}

//! raceodds: discover the day's races and collect their win odds.
//!
//! Entry point. Loads configuration and the track table, initialises
//! structured logging, wires the fetchers into the pipeline and writes
//! the collected odds as CSV. Ctrl+C stops the run and keeps whatever
//! was collected.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use raceodds::config::{self, AppConfig};
use raceodds::discovery::{parse_base_date, RaceIdEnumerator, TrackActivityResolver};
use raceodds::engine::pipeline::Pipeline;
use raceodds::engine::scheduler::FetchScheduler;
use raceodds::http::browser::BrowserFetcher;
use raceodds::http::cache::ResponseCache;
use raceodds::http::client::RequestClient;
use raceodds::http::PageFetcher;
use raceodds::storage;
use raceodds::tracks::TrackTable;

#[derive(Debug, Parser)]
#[command(name = "raceodds", version, about = "Discover races and fetch their win odds")]
struct Cli {
    /// Base date: `today`, `tomorrow` or YYYYMMDD.
    #[arg(long, default_value = "today")]
    date: String,

    /// Number of consecutive days to cover, starting at the base date.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    horizon: u32,

    /// Path to the TOML configuration file.
    #[arg(long, env = "RACEODDS_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Debug-level logging for this crate.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = AppConfig::load_or_default(&cli.config)?;

    // -- Fatal inputs -----------------------------------------------------

    let tracks = TrackTable::load(&cfg.discovery.track_table)?;
    let base = parse_base_date(&cli.date, Local::now().date_naive())
        .with_context(|| format!("Invalid --date '{}'", cli.date))?;

    info!(
        %base,
        horizon = cli.horizon,
        tracks = tracks.len(),
        workers = cfg.scheduler.workers,
        "raceodds starting up"
    );

    // -- Initialise components -------------------------------------------

    let cache = open_cache(&cfg).await;
    let proxy_url = cfg.proxy_url();

    let direct: Arc<dyn PageFetcher> = Arc::new(RequestClient::direct(&cfg.network, cache.clone())?);
    let proxied: Arc<dyn PageFetcher> = match &proxy_url {
        Some(url) => {
            info!(proxy = %config::proxy_endpoint(url), "Using forward proxy");
            Arc::new(RequestClient::proxied(&cfg.network, url, cache.clone())?)
        }
        None => {
            warn!("No proxy configured, proxied requests go direct");
            direct.clone()
        }
    };

    let renderer: Arc<dyn PageFetcher> = Arc::new(BrowserFetcher::new(
        proxy_url,
        cfg.network.user_agent.clone(),
        cfg.network.accept_language.clone(),
        cfg.scheduler.odds_row_selector.clone(),
        cfg.scheduler.render_wait(),
    ));

    let pipeline = Pipeline::new(
        tracks,
        TrackActivityResolver::new(direct, proxied.clone(), cfg.sources.clone()),
        RaceIdEnumerator::new(proxied, cfg.sources.clone(), &cfg.discovery),
        FetchScheduler::new(renderer, cfg.sources.clone(), &cfg.scheduler),
    );

    // -- Run ---------------------------------------------------------------

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let run = pipeline.run(base, cli.horizon, cancel_rx);
    tokio::pin!(run);

    let report = tokio::select! {
        report = &mut run => report,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, finishing in-flight work");
            let _ = cancel_tx.send(true);
            run.await
        }
    };

    if report.records.is_empty() {
        warn!(races = report.races.len(), "No odds collected, nothing written");
        return Ok(());
    }

    let path = storage::output_path(&cfg.output.dir, base);
    storage::write_odds_csv(&report.records, &path)?;

    info!(
        path = %path.display(),
        records = report.records.len(),
        failures = report.failures.len(),
        "raceodds finished"
    );

    Ok(())
}

/// Open the response cache, or run uncached if it cannot be opened.
async fn open_cache(cfg: &AppConfig) -> Option<Arc<ResponseCache>> {
    let ttl = Duration::from_secs(cfg.network.cache_ttl_secs);
    let opened = match &cfg.network.cache_path {
        Some(path) => ResponseCache::open(path, ttl).await,
        None => ResponseCache::in_memory(ttl).await,
    };

    match opened {
        Ok(cache) => {
            match cache.evict_expired().await {
                Ok(evicted) if evicted > 0 => info!(evicted, "Expired cache entries removed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Cache eviction failed"),
            }
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!(error = %e, "Response cache unavailable, running uncached");
            None
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "raceodds=debug" } else { "raceodds=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_logging = std::env::var("RACEODDS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

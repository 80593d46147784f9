use std::cmp::min;
use std::io::stderr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::signal;
use tokio::time::sleep;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

use hop_transaction_scraper::config::Config;
use hop_transaction_scraper::engine::IngestEngine;
use hop_transaction_scraper::fetch::HopApiClient;
use hop_transaction_scraper::notify::SlackNotifier;
use hop_transaction_scraper::storage::SqliteStore;

const BACKOFF_BASE_SECS: u64 = 60;
const BACKOFF_CAP_SECS: u64 = 1800;

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("AT_LOG_LEVEL")
        .map(|level| parse_log_level(&level))
        .unwrap_or(LevelFilter::INFO);
    setup_logging(log_level);

    let config = Config::from_env()?;
    info!("HOP transaction scraper starting...");

    let store = Arc::new(SqliteStore::open(&config.database_file)?);
    let client = Arc::new(HopApiClient::new(&config.base_url, config.request_timeout)?);

    if config.session_cookies.is_empty() {
        warn!("No session cookies configured; fetches will fail until the login flow provides them");
    } else {
        client.set_session_cookies(&config.session_cookies);
        info!("Installed {} session cookies", config.session_cookies.len());
    }

    let notifier = SlackNotifier::from_config(config.slack.as_ref(), config.request_timeout);
    if notifier.is_enabled() {
        info!("Slack notifications enabled");
    } else {
        info!("Slack notifications disabled (missing token or channel)");
    }

    let engine = IngestEngine::new(store, client, notifier);

    if !config.startup_delay.is_zero() {
        info!("Waiting {:?} before first cycle...", config.startup_delay);
        sleep(config.startup_delay).await;
    }

    let mut consecutive_failures: u32 = 0;
    loop {
        let timer = Instant::now();
        let report = engine.run_once(&config.cards).await;
        info!(
            "Cycle finished in {:?}: {} new transactions, {} new mismatches, {} failed cards",
            timer.elapsed(),
            report.new_transactions,
            report.new_mismatches,
            report.failed_cards
        );

        let wait = if report.all_succeeded() {
            consecutive_failures = 0;
            info!("Sleeping for {:?}...", config.period);
            config.period
        } else {
            consecutive_failures += 1;
            let backoff = backoff_duration(consecutive_failures);
            warn!(
                "Backing off for {:?} after {} consecutive failed cycles",
                backoff, consecutive_failures
            );
            backoff
        };

        tokio::select! {
            _ = sleep(wait) => {}
            _ = signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Exponential backoff on consecutive failed cycles, capped at 30 minutes.
fn backoff_duration(consecutive_failures: u32) -> Duration {
    let exponent = consecutive_failures.saturating_sub(1).min(5);
    Duration::from_secs(min(BACKOFF_BASE_SECS << exponent, BACKOFF_CAP_SECS))
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{level}', defaulting to 'info'");
            LevelFilter::INFO
        }
    }
}

fn setup_logging(level: LevelFilter) {
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry().with(terminal_log).init();
}

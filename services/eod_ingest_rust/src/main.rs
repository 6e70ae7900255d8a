//! EOD Quote Import Service
//!
//! Periodic batch importer for end-of-day price quotes.
//!
//! This service:
//! - Resolves the instrument universe (database `assets` table or TICKERS)
//! - Fetches EOD quotes from Tiingo under a shared rate gate with bounded
//!   in-flight concurrency
//! - Archives the merged record set to a parquet file
//! - Upserts the record set into PostgreSQL with a legacy-table fallback
//!
//! The two sinks are independent: either can be disabled by leaving its
//! destination unconfigured, and a failure in one never blocks the other.
//! The run exits zero even when every fetch or write fails; failures are
//! visible in the logs and the run summary, not the exit code.

mod config;
mod universe;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use config::IngestConfig;
use dotenv::dotenv;
use eodvault_rust_core::db::{create_pool, save_quotes, DbPoolConfig};
use eodvault_rust_core::sinks::save_to_parquet;
use eodvault_rust_core::{fetch_all, FetchOptions, RateGate, TiingoClient};
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting EOD quote import...");

    let config = IngestConfig::from_env()?;

    let pool = connect_database(&config).await;

    let Some(instruments) = resolve_universe(&config, pool.as_ref()).await else {
        warn!("no instrument universe available; nothing to do");
        return Ok(());
    };
    if instruments.is_empty() {
        warn!("instrument universe is empty; nothing to do");
        return Ok(());
    }

    let start_date = (Utc::now() - ChronoDuration::days(config.history_days)).date_naive();
    info!(
        instruments = instruments.len(),
        start_date = %start_date,
        rate_limit = config.rate_limit,
        "fetch window resolved"
    );

    let client = TiingoClient::new(config.tiingo_token.as_str(), config.http_timeout);
    let gate = Arc::new(RateGate::per_second(config.rate_limit));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping dispatch");
            signal_token.cancel();
        }
    });

    let options = FetchOptions {
        max_in_flight: config.max_in_flight,
        show_progress: !config.hide_progress,
    };
    let (quotes, stats) = fetch_all(client, instruments, start_date, gate, cancel, options).await;
    stats.log_summary();

    if let Some(path) = &config.parquet_file {
        match save_to_parquet(&quotes, Path::new(path)) {
            Ok(rows) => info!(rows, path = %path, "parquet archive written"),
            Err(err) => error!(path = %path, error = %err, "parquet archive failed"),
        }
    }

    if let Some(pool) = &pool {
        let report = save_quotes(pool, &quotes).await;
        if report.lost > 0 {
            error!(lost = report.lost, "records lost on both database paths");
        }
    }

    info!("EOD quote import complete");
    Ok(())
}

/// Connect to the database when a URL is configured. Connection failure
/// disables the upsert sink (and database-backed universe) but never aborts
/// the run.
async fn connect_database(config: &IngestConfig) -> Option<PgPool> {
    let url = config.database_url.as_ref()?;
    match create_pool(url, &DbPoolConfig::from_env()).await {
        Ok(pool) => Some(pool),
        Err(err) => {
            error!(error = %err, "database unavailable; upsert sink disabled");
            None
        }
    }
}

/// Resolve the instrument universe: TICKERS override first, then the
/// database. Returns `None` when no source is available.
async fn resolve_universe(
    config: &IngestConfig,
    pool: Option<&PgPool>,
) -> Option<Vec<eodvault_rust_core::Instrument>> {
    let instruments = if let Some(tickers) = &config.tickers {
        universe::universe_from_tickers(tickers)
    } else if let Some(pool) = pool {
        match universe::universe_from_database(pool).await {
            Ok(instruments) => instruments,
            Err(err) => {
                error!(error = %err, "could not load instrument universe");
                return None;
            }
        }
    } else {
        return None;
    };

    Some(universe::truncate_universe(instruments, config.max_assets))
}

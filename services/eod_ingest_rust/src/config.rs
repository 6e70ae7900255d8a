//! Configuration constants and environment loading for the EOD importer
//!
//! This module manages all runtime configuration:
//! - Provider credentials and request pacing
//! - Lookback window for the fetch
//! - Sink destinations (parquet file, database URL)
//! - Universe overrides and concurrency limits

use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

/// Default provider requests per second. Matches the paid-tier allowance;
/// override with TIINGO_RATE_LIMIT for other plans.
pub const DEFAULT_RATE_LIMIT: u32 = 5;

/// Default lookback window in calendar days.
pub const DEFAULT_HISTORY_DAYS: i64 = 7;

/// Default cap on concurrently in-flight fetches.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for one import run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Tiingo API token (required)
    pub tiingo_token: String,
    /// Provider requests per second
    pub rate_limit: u32,
    /// How many calendar days back the fetch window starts
    pub history_days: i64,
    /// Parquet archive destination; archive sink disabled when unset
    pub parquet_file: Option<String>,
    /// PostgreSQL connection string; upsert sink disabled when unset
    pub database_url: Option<String>,
    /// Explicit ticker universe override (comma separated)
    pub tickers: Option<Vec<String>>,
    /// Truncate the universe to this many instruments
    pub max_assets: Option<usize>,
    /// Cap on concurrently in-flight fetches
    pub max_in_flight: usize,
    /// Suppress the progress bar
    pub hide_progress: bool,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
}

impl IngestConfig {
    /// Load configuration from environment variables with sensible defaults.
    /// Only the provider token is mandatory.
    pub fn from_env() -> Result<Self> {
        let tiingo_token = match env::var("TIINGO_TOKEN") {
            Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => bail!("TIINGO_TOKEN must be set to a non-empty API token"),
        };

        let rate_limit = env::var("TIINGO_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT);

        let history_days = env::var("HISTORY_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_HISTORY_DAYS)
            .max(1);

        let parquet_file = env::var("PARQUET_FILE").ok().filter(|v| !v.is_empty());
        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let tickers = env::var("TICKERS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        });

        let max_assets = env::var("MAX_ASSETS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        let max_in_flight = env::var("MAX_IN_FLIGHT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT)
            .max(1);

        let hide_progress = env::var("HIDE_PROGRESS")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let http_timeout = Duration::from_secs(
            env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        Ok(Self {
            tiingo_token,
            rate_limit,
            history_days,
            parquet_file,
            database_url,
            tickers,
            max_assets,
            max_in_flight,
            hide_progress,
            http_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; run with --test-threads=1 or rely
    // on distinct variable names per test.

    #[test]
    fn test_missing_token_is_an_error() {
        env::remove_var("TIINGO_TOKEN");
        assert!(IngestConfig::from_env().is_err());
    }

    #[test]
    fn test_ticker_list_parsing() {
        let raw = "AAPL, MSFT ,,BRK/B";
        let parsed: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(parsed, ["AAPL", "MSFT", "BRK/B"]);
    }
}

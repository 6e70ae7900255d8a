//! Tiingo EOD price client.
//!
//! One HTTP GET per instrument against the daily-prices endpoint, with the
//! provider's ticker convention (`/` becomes `-`) and market-close date
//! normalization applied to every parsed entry.

use crate::models::{EodQuote, Instrument};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default Tiingo daily-prices endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://api.tiingo.com/tiingo/daily";

#[derive(Debug, Error)]
pub enum TiingoError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode payload for {ticker}: {source}")]
    Decode {
        ticker: String,
        source: reqwest::Error,
    },
}

/// Raw quote entry as returned by the provider. Ticker and composite FIGI
/// are not part of the payload; they get stamped from the instrument.
#[derive(Debug, Deserialize)]
struct RawEod {
    date: String,
    open: f32,
    high: f32,
    low: f32,
    close: f32,
    volume: f32,
    #[serde(rename = "divCash")]
    div_cash: f32,
    #[serde(rename = "splitFactor")]
    split_factor: f32,
}

#[derive(Clone)]
pub struct TiingoClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TiingoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiingoClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TiingoClient {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
        }
    }

    /// Point the client at a different endpoint base (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch all EOD quotes for one instrument from `start_date` onward.
    ///
    /// Every returned record carries the instrument's ticker and composite
    /// FIGI and a normalized `event_date` where the provider date parsed.
    pub async fn fetch_eod_quotes(
        &self,
        instrument: &Instrument,
        start_date: NaiveDate,
    ) -> Result<Vec<EodQuote>, TiingoError> {
        let url = format!(
            "{}/{}/prices?startDate={}&token={}",
            self.base_url,
            provider_ticker(&instrument.ticker),
            start_date.format("%Y-%m-%d"),
            self.token
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| TiingoError::Request {
                url: redact_token(&url),
                source,
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            debug!(
                ticker = %instrument.ticker,
                status = status.as_u16(),
                body = %body,
                "provider rejected eod quote request"
            );
            return Err(TiingoError::Status {
                url: redact_token(&url),
                status: status.as_u16(),
            });
        }

        let raw: Vec<RawEod> =
            response
                .json()
                .await
                .map_err(|source| TiingoError::Decode {
                    ticker: instrument.ticker.clone(),
                    source,
                })?;

        Ok(raw
            .into_iter()
            .map(|r| stamp_quote(r, instrument))
            .collect())
    }
}

/// Translate a ticker to the provider's convention: `/` turns into `-`
/// (e.g. `BRK/B` is requested as `BRK-B`).
pub fn provider_ticker(ticker: &str) -> String {
    ticker.replace('/', "-")
}

/// Normalize a provider date to the exchange-local market close:
/// 16:00 America/New_York on the reported calendar date.
///
/// Returns `None` when the provider string is not RFC 3339; callers keep the
/// record with its provider date unmodified in that case.
pub fn normalize_event_date(provider_date: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(provider_date).ok()?;
    let date = parsed.date_naive();
    New_York
        .with_ymd_and_hms(date.year(), date.month(), date.day(), 16, 0, 0)
        .single()
        .map(|close| close.with_timezone(&Utc))
}

fn stamp_quote(raw: RawEod, instrument: &Instrument) -> EodQuote {
    let event_date = normalize_event_date(&raw.date);
    if event_date.is_none() {
        warn!(
            ticker = %instrument.ticker,
            date = %raw.date,
            "provider date did not parse; keeping record un-normalized"
        );
    }
    EodQuote {
        date: raw.date,
        event_date,
        ticker: instrument.ticker.clone(),
        composite_figi: instrument.composite_figi.clone(),
        open: raw.open,
        high: raw.high,
        low: raw.low,
        close: raw.close,
        volume: raw.volume,
        dividend: raw.div_cash,
        split_factor: raw.split_factor,
    }
}

/// Strip the credential from a URL before it lands in logs or errors.
fn redact_token(url: &str) -> String {
    match url.split_once("token=") {
        Some((prefix, _)) => format!("{prefix}token=<redacted>"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_provider_ticker_rewrites_slash() {
        assert_eq!(provider_ticker("BRK/B"), "BRK-B");
        assert_eq!(provider_ticker("AAPL"), "AAPL");
        assert_eq!(provider_ticker("A/B/C"), "A-B-C");
    }

    #[test]
    fn test_normalize_event_date_to_ny_close() {
        // Winter date (EST, UTC-5): 16:00 New York == 21:00 UTC
        let normalized = normalize_event_date("2022-01-03T00:00:00.000Z").unwrap();
        assert_eq!(normalized.to_rfc3339(), "2022-01-03T21:00:00+00:00");

        let local = normalized.with_timezone(&New_York);
        assert_eq!(local.hour(), 16);
        assert_eq!((local.year(), local.month(), local.day()), (2022, 1, 3));
    }

    #[test]
    fn test_normalize_event_date_ignores_source_timezone() {
        // Same calendar date reported with a non-UTC offset still lands on
        // that date's New York close.
        let normalized = normalize_event_date("2022-01-03T09:30:00+09:00").unwrap();
        let local = normalized.with_timezone(&New_York);
        assert_eq!((local.year(), local.month(), local.day()), (2022, 1, 3));
        assert_eq!(local.hour(), 16);
    }

    #[test]
    fn test_normalize_event_date_dst() {
        // Summer date (EDT, UTC-4): 16:00 New York == 20:00 UTC
        let normalized = normalize_event_date("2022-07-01T00:00:00Z").unwrap();
        assert_eq!(normalized.to_rfc3339(), "2022-07-01T20:00:00+00:00");
    }

    #[test]
    fn test_unparseable_date_passes_through() {
        assert!(normalize_event_date("2022-01-03").is_none());
        assert!(normalize_event_date("not-a-date").is_none());
    }

    #[test]
    fn test_raw_eod_decodes_provider_payload() {
        let body = r#"{
            "date": "2022-01-03T00:00:00.000Z",
            "close": 182.01,
            "high": 182.88,
            "low": 177.71,
            "open": 177.83,
            "volume": 104487900,
            "adjClose": 182.01,
            "divCash": 0.22,
            "splitFactor": 1.0
        }"#;
        let raw: RawEod = serde_json::from_str(body).unwrap();
        assert_eq!(raw.open, 177.83);
        assert_eq!(raw.div_cash, 0.22);
        assert_eq!(raw.split_factor, 1.0);
    }

    #[test]
    fn test_redact_token() {
        let url = "https://api.tiingo.com/tiingo/daily/AAPL/prices?startDate=2022-01-01&token=secret";
        let redacted = redact_token(url);
        assert!(!redacted.contains("secret"));
        assert!(redacted.ends_with("token=<redacted>"));
    }
}

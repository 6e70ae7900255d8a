// Shared models for Eodvault Rust services
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Instrument Universe
// ============================================================================

/// A tradeable instrument as provided by the universe feed.
///
/// Instances are immutable for the duration of a run. The universe arrives
/// already filtered by exchange, asset class, and listing age; the ingestion
/// core does no further filtering.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instrument {
    pub ticker: String,
    pub composite_figi: String,
    pub exchange: String,
    pub asset_class: String,
    pub currency: String,
    pub listed: Option<NaiveDate>,
    pub delisted: Option<NaiveDate>,
}

impl Instrument {
    /// Build a bare instrument from just a ticker (ad-hoc runs via TICKERS).
    pub fn from_ticker(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            composite_figi: String::new(),
            exchange: String::new(),
            asset_class: String::new(),
            currency: String::new(),
            listed: None,
            delisted: None,
        }
    }
}

// ============================================================================
// EOD Quote Records
// ============================================================================

/// One end-of-day quote, normalized into the canonical record shape.
///
/// `ticker` and `composite_figi` are always copied from the owning
/// [`Instrument`]; the provider payload omits both. `event_date` is the
/// exchange-local market close (16:00 America/New_York) derived from the
/// provider date, or `None` when the provider date could not be parsed;
/// in that case `date` still carries the provider string unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodQuote {
    /// Trade date exactly as returned by the provider.
    pub date: String,
    /// Normalized market-close instant, when the provider date parsed.
    pub event_date: Option<DateTime<Utc>>,
    pub ticker: String,
    pub composite_figi: String,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
    pub volume: f32,
    pub dividend: f32,
    pub split_factor: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_from_ticker() {
        let inst = Instrument::from_ticker("BRK/B");
        assert_eq!(inst.ticker, "BRK/B");
        assert!(inst.composite_figi.is_empty());
        assert!(inst.delisted.is_none());
    }
}

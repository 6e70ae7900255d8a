//! Instrument universe resolution.
//!
//! The universe comes from one of two places: an explicit TICKERS override
//! (no database round trip, placeholder FIGIs), or the `assets` table of the
//! target database. MAX_ASSETS truncates either source.

use anyhow::{Context, Result};
use eodvault_rust_core::Instrument;
use sqlx::PgPool;
use tracing::info;

const ACTIVE_ASSETS_QUERY: &str = r#"
SELECT ticker, composite_figi, exchange, asset_class, currency, listed, delisted
FROM assets
WHERE active = 't'
ORDER BY ticker
"#;

/// Build the universe from an explicit ticker list.
pub fn universe_from_tickers(tickers: &[String]) -> Vec<Instrument> {
    tickers
        .iter()
        .map(|t| Instrument::from_ticker(t))
        .collect()
}

/// Load the active instrument universe from the `assets` table.
pub async fn universe_from_database(pool: &PgPool) -> Result<Vec<Instrument>> {
    let instruments: Vec<Instrument> = sqlx::query_as(ACTIVE_ASSETS_QUERY)
        .fetch_all(pool)
        .await
        .context("Failed to load active assets from database")?;

    info!(count = instruments.len(), "loaded instrument universe");
    Ok(instruments)
}

/// Apply the MAX_ASSETS cap, keeping the head of the list.
pub fn truncate_universe(mut instruments: Vec<Instrument>, max_assets: Option<usize>) -> Vec<Instrument> {
    if let Some(max) = max_assets {
        if instruments.len() > max {
            info!(
                total = instruments.len(),
                max, "truncating instrument universe"
            );
            instruments.truncate(max);
        }
    }
    instruments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_override_builds_placeholder_instruments() {
        let tickers = vec!["AAPL".to_string(), "BRK/B".to_string()];
        let universe = universe_from_tickers(&tickers);
        assert_eq!(universe.len(), 2);
        assert_eq!(universe[0].ticker, "AAPL");
        assert_eq!(universe[1].ticker, "BRK/B");
        assert!(universe[1].composite_figi.is_empty());
    }

    #[test]
    fn test_truncation_keeps_the_head() {
        let universe = universe_from_tickers(&[
            "A".to_string(),
            "B".to_string(),
            "C".to_string(),
        ]);
        let capped = truncate_universe(universe, Some(2));
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].ticker, "A");

        let unchanged = truncate_universe(universe_from_tickers(&["A".to_string()]), Some(5));
        assert_eq!(unchanged.len(), 1);

        let uncapped = truncate_universe(universe_from_tickers(&["A".to_string()]), None);
        assert_eq!(uncapped.len(), 1);
    }
}

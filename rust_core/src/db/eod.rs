//! EOD quote upsert sink.
//!
//! Writes the merged record set to PostgreSQL with idempotent, parameterized
//! upserts keyed by (ticker, event_date). When the canonical `eod` table
//! rejects a record (schema absent mid-migration, constraint mismatch), the
//! same statement is retried against the legacy `eod_v1` table. Every record
//! ends in exactly one outcome bucket so nothing is lost silently.

use crate::models::EodQuote;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

/// Value written to the `source` column for every upserted row.
pub const QUOTE_SOURCE: &str = "api.tiingo.com";

const CANONICAL_UPSERT: &str = r#"
INSERT INTO eod (
    ticker, composite_figi, event_date,
    open, high, low, close, volume,
    dividend, split_factor, source
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (ticker, event_date) DO UPDATE SET
    open = EXCLUDED.open,
    high = EXCLUDED.high,
    low = EXCLUDED.low,
    close = EXCLUDED.close,
    volume = EXCLUDED.volume,
    dividend = EXCLUDED.dividend,
    split_factor = EXCLUDED.split_factor,
    source = EXCLUDED.source
"#;

const LEGACY_UPSERT: &str = r#"
INSERT INTO eod_v1 (
    ticker, composite_figi, event_date,
    open, high, low, close, volume,
    dividend, split_factor, source
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
ON CONFLICT (ticker, event_date) DO UPDATE SET
    open = EXCLUDED.open,
    high = EXCLUDED.high,
    low = EXCLUDED.low,
    close = EXCLUDED.close,
    volume = EXCLUDED.volume,
    dividend = EXCLUDED.dividend,
    split_factor = EXCLUDED.split_factor,
    source = EXCLUDED.source
"#;

/// Final disposition of one record's write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written to the canonical `eod` table.
    Canonical,
    /// Canonical write failed; written to the legacy `eod_v1` table.
    Fallback,
    /// Both write paths failed; the record was not persisted.
    Lost,
    /// Record had no normalized event date (half the key) and was skipped.
    SkippedMissingDate,
}

/// Per-run upsert counters. `lost` is the observable silent-data-loss
/// condition: records that exhausted both write paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub canonical: usize,
    pub fallback: usize,
    pub lost: usize,
    pub skipped_missing_date: usize,
}

impl SaveReport {
    pub fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Canonical => self.canonical += 1,
            WriteOutcome::Fallback => self.fallback += 1,
            WriteOutcome::Lost => self.lost += 1,
            WriteOutcome::SkippedMissingDate => self.skipped_missing_date += 1,
        }
    }

    pub fn total_written(&self) -> usize {
        self.canonical + self.fallback
    }

    pub fn log_summary(&self) {
        info!(
            canonical = self.canonical,
            fallback = self.fallback,
            lost = self.lost,
            skipped_missing_date = self.skipped_missing_date,
            "database save complete"
        );
    }
}

/// Upsert every quote in the set. Per-record failures never abort the batch;
/// the report accounts for each record exactly once.
pub async fn save_quotes(pool: &PgPool, quotes: &[EodQuote]) -> SaveReport {
    info!(records = quotes.len(), "saving eod quotes to database");

    let mut report = SaveReport::default();
    for quote in quotes {
        report.record(save_one(pool, quote).await);
    }

    report.log_summary();
    report
}

async fn save_one(pool: &PgPool, quote: &EodQuote) -> WriteOutcome {
    let Some(event_date) = quote.event_date else {
        warn!(
            ticker = %quote.ticker,
            date = %quote.date,
            "record has no normalized event date; skipping database write"
        );
        return WriteOutcome::SkippedMissingDate;
    };

    let canonical_err = match exec_upsert(pool, CANONICAL_UPSERT, quote, event_date).await {
        Ok(()) => return WriteOutcome::Canonical,
        Err(err) => err,
    };

    debug!(
        ticker = %quote.ticker,
        error = %canonical_err,
        "canonical upsert failed; retrying against legacy table"
    );

    match exec_upsert(pool, LEGACY_UPSERT, quote, event_date).await {
        Ok(()) => {
            warn!(
                ticker = %quote.ticker,
                event_date = %event_date,
                canonical_error = %canonical_err,
                "quote written via legacy fallback table"
            );
            WriteOutcome::Fallback
        }
        Err(fallback_err) => {
            error!(
                ticker = %quote.ticker,
                event_date = %event_date,
                canonical_error = %canonical_err,
                fallback_error = %fallback_err,
                "quote lost: canonical and legacy upserts both failed"
            );
            WriteOutcome::Lost
        }
    }
}

async fn exec_upsert(
    pool: &PgPool,
    statement: &str,
    quote: &EodQuote,
    event_date: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query(statement)
        .bind(&quote.ticker)
        .bind(&quote.composite_figi)
        .bind(event_date)
        .bind(quote.open as f64)
        .bind(quote.high as f64)
        .bind(quote.low as f64)
        .bind(quote.close as f64)
        .bind(quote.volume as f64)
        .bind(quote.dividend as f64)
        .bind(quote.split_factor as f64)
        .bind(QUOTE_SOURCE)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_accounts_every_outcome_once() {
        let mut report = SaveReport::default();
        report.record(WriteOutcome::Canonical);
        report.record(WriteOutcome::Canonical);
        report.record(WriteOutcome::Fallback);
        report.record(WriteOutcome::Lost);
        report.record(WriteOutcome::SkippedMissingDate);

        assert_eq!(report.canonical, 2);
        assert_eq!(report.fallback, 1);
        assert_eq!(report.lost, 1);
        assert_eq!(report.skipped_missing_date, 1);
        assert_eq!(report.total_written(), 3);
    }

    #[test]
    fn test_both_statements_are_parameterized_upserts() {
        for statement in [CANONICAL_UPSERT, LEGACY_UPSERT] {
            assert!(statement.contains("ON CONFLICT (ticker, event_date)"));
            assert!(statement.contains("$11"));
            // No literal value composition anywhere in the statement text.
            assert!(!statement.contains('\''));
        }
        assert!(CANONICAL_UPSERT.contains("INSERT INTO eod "));
        assert!(LEGACY_UPSERT.contains("INSERT INTO eod_v1 "));
    }
}

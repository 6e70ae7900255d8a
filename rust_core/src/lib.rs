//! Eodvault Core - rate-gated EOD quote ingestion and dual-sink persistence.
//!
//! This library provides:
//! - Tiingo EOD price client with provider ticker translation and
//!   market-close date normalization
//! - Token-bucket dispatch gate shared across the run
//! - Concurrent fetch pipeline: rate-gated fan-out, bounded in-flight
//!   concurrency, single-queue fan-in, per-run statistics
//! - Parquet archive sink (GZIP, small pages, large row groups)
//! - PostgreSQL upsert sink with a legacy-schema fallback path and
//!   per-record outcome accounting

pub mod clients;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod ratelimit;
pub mod sinks;

pub use clients::{TiingoClient, TiingoError};
pub use models::{EodQuote, Instrument};
pub use pipeline::{fetch_all, FetchOptions, FetchStats};
pub use ratelimit::RateGate;

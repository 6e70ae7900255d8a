//! Rate-gated fetch pipeline: fan-out, fan-in, and run statistics.
//!
//! The dispatcher walks the instrument universe in order, takes one token
//! from the shared [`RateGate`] per instrument, and spawns one fetch task per
//! instrument. Every task publishes its quotes into a single bounded result
//! queue; the aggregator drains that queue until every task's sender has
//! been dropped, so downstream use only starts after full completion.
//!
//! Failure isolation: one instrument's fetch failure yields zero records for
//! that instrument and a counted log line; it never aborts the run.

use crate::clients::TiingoClient;
use crate::models::{EodQuote, Instrument};
use crate::ratelimit::RateGate;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounded capacity of the shared result queue (backpressure for workers).
const RESULT_BUFFER: usize = 1024;

/// Default cap on concurrently in-flight fetches. The rate gate bounds how
/// fast tasks start; this bounds how many are alive at once, so sockets and
/// task memory stay flat regardless of universe size.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub max_in_flight: usize,
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            show_progress: false,
        }
    }
}

/// Per-run fetch counters, reported in the final summary.
#[derive(Debug, Default, Clone)]
pub struct FetchStats {
    /// Universe size handed to the dispatcher.
    pub instruments: usize,
    /// Fetch tasks actually started (less than `instruments` if cancelled).
    pub dispatched: usize,
    /// Instruments that produced zero records due to a fetch/parse failure.
    pub fetch_failures: usize,
    /// Records whose provider date did not parse (kept, un-normalized).
    pub bad_dates: usize,
    /// Records in the merged output set.
    pub quotes: usize,
}

impl FetchStats {
    pub fn log_summary(&self) {
        info!(
            instruments = self.instruments,
            dispatched = self.dispatched,
            fetch_failures = self.fetch_failures,
            bad_dates = self.bad_dates,
            quotes = self.quotes,
            "eod fetch complete"
        );
    }
}

/// Fetch EOD quotes for the whole universe and merge them into one set.
///
/// Dispatch stops early when `cancel` fires; already-dispatched tasks drain
/// naturally. The call returns only after every started task has finished.
pub async fn fetch_all(
    client: TiingoClient,
    instruments: Vec<Instrument>,
    start_date: NaiveDate,
    gate: Arc<RateGate>,
    cancel: CancellationToken,
    options: FetchOptions,
) -> (Vec<EodQuote>, FetchStats) {
    let total = instruments.len();
    let semaphore = Arc::new(Semaphore::new(options.max_in_flight.max(1)));
    let (tx, mut rx) = mpsc::channel::<EodQuote>(RESULT_BUFFER);
    let fetch_failures = Arc::new(AtomicUsize::new(0));

    let bar = if options.show_progress {
        ProgressBar::new(total as u64)
    } else {
        ProgressBar::hidden()
    };

    let dispatcher = {
        let failures = Arc::clone(&fetch_failures);
        let bar = bar.clone();
        tokio::spawn(async move {
            let mut dispatched = 0usize;
            for instrument in instruments {
                if cancel.is_cancelled() {
                    warn!(
                        dispatched,
                        remaining = total - dispatched,
                        "cancellation requested; stopping dispatch"
                    );
                    break;
                }

                // Rate-gate the *start* of each fetch, then cap in-flight
                // tasks with the semaphore.
                gate.take().await;
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                bar.inc(1);
                dispatched += 1;

                let client = client.clone();
                let tx = tx.clone();
                let failures = Arc::clone(&failures);
                tokio::spawn(async move {
                    let _permit = permit;
                    match client.fetch_eod_quotes(&instrument, start_date).await {
                        Ok(quotes) => {
                            for quote in quotes {
                                if tx.send(quote).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(err) => {
                            failures.fetch_add(1, Ordering::Relaxed);
                            error!(
                                ticker = %instrument.ticker,
                                error = %err,
                                "error when requesting eod quote"
                            );
                        }
                    }
                });
            }
            bar.finish_and_clear();
            dispatched
        })
    };

    // The root sender moved into the dispatcher task; the queue closes once
    // the dispatcher and every worker have dropped their senders.
    let mut merged: Vec<EodQuote> = Vec::new();
    while let Some(quote) = rx.recv().await {
        merged.push(quote);
    }

    let dispatched = match dispatcher.await {
        Ok(count) => count,
        Err(err) => {
            error!(error = %err, "dispatcher task failed");
            0
        }
    };

    let stats = FetchStats {
        instruments: total,
        dispatched,
        fetch_failures: fetch_failures.load(Ordering::Relaxed),
        bad_dates: merged.iter().filter(|q| q.event_date.is_none()).count(),
        quotes: merged.len(),
    };

    (merged, stats)
}

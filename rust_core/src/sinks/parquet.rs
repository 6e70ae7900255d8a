//! Columnar archive sink.
//!
//! Writes the merged quote set to a single GZIP-compressed parquet file, one
//! row per quote. Opening the destination and the final close are fatal for
//! this sink; a failed batch write is logged and skipped so the remaining
//! records still land.

use crate::models::EodQuote;
use arrow::array::{ArrayRef, Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::{Compression, GzipLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Rows per write call; batches failing conversion are skipped as a unit.
const WRITE_CHUNK: usize = 8 * 1024;

/// Large row groups (the archive targets ~128 MiB groups) with small pages.
const MAX_ROW_GROUP_SIZE: usize = 1024 * 1024;
const DATA_PAGE_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ParquetSinkError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Column layout of the archive file.
pub fn eod_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Utf8, false),
        Field::new("ticker", DataType::Utf8, false),
        Field::new("compositeFigi", DataType::Utf8, false),
        Field::new("open", DataType::Float32, false),
        Field::new("high", DataType::Float32, false),
        Field::new("low", DataType::Float32, false),
        Field::new("close", DataType::Float32, false),
        Field::new("volume", DataType::Float32, false),
        Field::new("dividend", DataType::Float32, false),
        Field::new("split", DataType::Float32, false),
    ])
}

/// Save EOD quotes to a parquet file, returning the count actually written.
pub fn save_to_parquet(records: &[EodQuote], path: &Path) -> Result<usize, ParquetSinkError> {
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::GZIP(GzipLevel::default()))
        .set_max_row_group_size(MAX_ROW_GROUP_SIZE)
        .set_data_page_size_limit(DATA_PAGE_SIZE)
        .build();

    let schema: SchemaRef = Arc::new(eod_schema());
    let mut writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))?;

    let mut written = 0usize;
    for chunk in records.chunks(WRITE_CHUNK) {
        let batch = match quote_batch(chunk, Arc::clone(&schema)) {
            Ok(batch) => batch,
            Err(err) => {
                error!(
                    rows = chunk.len(),
                    error = %err,
                    "parquet batch conversion failed; skipping records"
                );
                continue;
            }
        };
        match writer.write(&batch) {
            Ok(()) => written += chunk.len(),
            Err(err) => {
                error!(
                    rows = chunk.len(),
                    first_ticker = %chunk.first().map(|q| q.ticker.as_str()).unwrap_or(""),
                    error = %err,
                    "parquet write failed for record batch"
                );
            }
        }
    }

    writer.close()?;
    info!(records = written, path = %path.display(), "parquet write finished");
    Ok(written)
}

fn quote_batch(records: &[EodQuote], schema: SchemaRef) -> Result<RecordBatch, ParquetSinkError> {
    let date = Arc::new(StringArray::from(
        records.iter().map(|q| q.date.clone()).collect::<Vec<_>>(),
    )) as ArrayRef;
    let ticker = Arc::new(StringArray::from(
        records.iter().map(|q| q.ticker.clone()).collect::<Vec<_>>(),
    )) as ArrayRef;
    let figi = Arc::new(StringArray::from(
        records
            .iter()
            .map(|q| q.composite_figi.clone())
            .collect::<Vec<_>>(),
    )) as ArrayRef;
    let open = float_column(records, |q| q.open);
    let high = float_column(records, |q| q.high);
    let low = float_column(records, |q| q.low);
    let close = float_column(records, |q| q.close);
    let volume = float_column(records, |q| q.volume);
    let dividend = float_column(records, |q| q.dividend);
    let split = float_column(records, |q| q.split_factor);

    let arrays = vec![
        date, ticker, figi, open, high, low, close, volume, dividend, split,
    ];
    Ok(RecordBatch::try_new(schema, arrays)?)
}

fn float_column(records: &[EodQuote], get: impl Fn(&EodQuote) -> f32) -> ArrayRef {
    Arc::new(Float32Array::from(
        records.iter().map(|q| get(q)).collect::<Vec<_>>(),
    )) as ArrayRef
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn sample_quote(ticker: &str, date: &str, close: f32) -> EodQuote {
        EodQuote {
            date: date.to_string(),
            event_date: crate::clients::tiingo::normalize_event_date(date),
            ticker: ticker.to_string(),
            composite_figi: format!("BBG-{ticker}"),
            open: close - 1.5,
            high: close + 0.25,
            low: close - 2.0,
            close,
            volume: 104_487_900.0,
            dividend: 0.22,
            split_factor: 1.0,
        }
    }

    #[test]
    fn round_trips_all_fields() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("eod.parquet");

        let records = vec![
            sample_quote("AAPL", "2022-01-03T00:00:00.000Z", 182.01),
            sample_quote("BRK/B", "2022-01-03T00:00:00.000Z", 301.55),
        ];
        let written = save_to_parquet(&records, &path).expect("write parquet");
        assert_eq!(written, 2);

        let file = File::open(&path).expect("open parquet");
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .expect("reader builder")
            .build()
            .expect("reader");

        let mut rows = 0usize;
        for batch in reader {
            let batch = batch.expect("batch");
            let tickers = batch
                .column(1)
                .as_any()
                .downcast_ref::<StringArray>()
                .expect("ticker column");
            let closes = batch
                .column(6)
                .as_any()
                .downcast_ref::<Float32Array>()
                .expect("close column");
            let dividends = batch
                .column(8)
                .as_any()
                .downcast_ref::<Float32Array>()
                .expect("dividend column");
            for i in 0..batch.num_rows() {
                let expected = &records[rows + i];
                assert_eq!(tickers.value(i), expected.ticker);
                assert_eq!(closes.value(i), expected.close);
                assert_eq!(dividends.value(i), expected.dividend);
            }
            rows += batch.num_rows();
        }
        assert_eq!(rows, records.len());
    }

    #[test]
    fn empty_record_set_still_produces_a_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("empty.parquet");

        let written = save_to_parquet(&[], &path).expect("write parquet");
        assert_eq!(written, 0);
        assert!(path.exists());
    }

    #[test]
    fn unwritable_destination_is_fatal() {
        let records = vec![sample_quote("AAPL", "2022-01-03T00:00:00.000Z", 182.01)];
        let result = save_to_parquet(&records, Path::new("/nonexistent-dir/eod.parquet"));
        assert!(matches!(result, Err(ParquetSinkError::Io(_))));
    }
}

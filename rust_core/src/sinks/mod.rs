pub mod parquet;

pub use parquet::{save_to_parquet, ParquetSinkError};

pub mod eod;
pub mod pool;

// Re-export commonly used types
pub use eod::{save_quotes, SaveReport, WriteOutcome};
pub use pool::{create_pool, DbPoolConfig};

pub mod tiingo;

// Re-export commonly used types
pub use tiingo::{TiingoClient, TiingoError};

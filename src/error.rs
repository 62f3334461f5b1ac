use crate::types::symbol::Symbol;
use thiserror::Error;

/// The engine's error taxonomy. `SourceMissing` and `ReaderFault` are
/// never returned to the caller — they are logged and the affected stream
/// is retired in place. Only `InvalidConfiguration` is fatal.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("no source for {symbol} on {date}")]
    SourceMissing { symbol: Symbol, date: chrono::DateTime<chrono::Utc> },

    #[error("reader fault for {symbol}: {detail}")]
    ReaderFault { symbol: Symbol, detail: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

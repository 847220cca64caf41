//! Error taxonomy (spec.md §7), grounded on `network.rs`'s `FetchError`.

use thiserror::Error;

/// C1 fetcher errors. A 4xx other than 429 stops retries immediately;
/// 5xx and network errors retry.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,
    #[error("connection reset")]
    ConnectionReset,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("exhausted retries")]
    TooManyRetries,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl HttpError {
    /// Whether this error should stop retrying immediately (a definitive
    /// 4xx other than 429), as opposed to being retried (5xx, network).
    pub fn is_terminal(&self) -> bool {
        matches!(self, HttpError::HttpStatus(code) if (400..500).contains(code) && *code != 429)
    }
}

/// C2/C3 parse errors. Always caught at the per-element/per-record
/// boundary and converted into a counter; never escapes a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no matching selector")]
    SelectorMiss,
    #[error("unparseable date")]
    UnparseableDate,
    #[error("ambiguous or missing case count")]
    AmbiguousNumber,
    #[error("empty response")]
    Empty,
}

/// C6 store errors. Causes the current source's transaction to roll back.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
    #[error("transaction aborted: {0}")]
    Transaction(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl<E: std::fmt::Display> From<sled::transaction::TransactionError<E>> for StoreError {
    fn from(e: sled::transaction::TransactionError<E>) -> Self {
        StoreError::Transaction(e.to_string())
    }
}

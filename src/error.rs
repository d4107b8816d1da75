//! Error taxonomy for the acquisition pipeline.
//!
//! The contract throughout: transient failures are retried or degraded,
//! never fatal. Only [`WatchError::NoTokenAvailable`] (empty pool and a
//! failed refresh) can end a poll cycle early besides a total feed failure.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by pipeline components.
#[derive(Debug, Error)]
pub enum WatchError {
    /// All retry attempts for one request were exhausted.
    #[error("fetch failed for {url} after {attempts} attempts")]
    FetchFailed { url: String, attempts: u32 },

    /// Upstream returned a non-success status or a rate-limit marker body.
    #[error("rate limited or rejected by upstream: {url} (status {status})")]
    RateLimited { url: String, status: u16 },

    /// The token pool is empty and a refresh attempt yielded nothing.
    #[error("no auth token available: pool is empty and refresh yielded nothing")]
    NoTokenAvailable,

    /// A payload could not be parsed. Callers degrade the sub-result instead
    /// of propagating this past the component boundary.
    #[error("malformed payload: {0}")]
    Parse(String),

    /// A per-symbol enrichment task exceeded its deadline.
    #[error("symbol task timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;

use std::time::Duration;

/// Every way a fetch, extraction or training call can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("No reference to fetch")]
    MissingReference,
    #[error("Rate limited by {url}, retry after {retry_after:?}")]
    RateLimited { url: String, retry_after: Duration },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Computation error: {0}")]
    Computation(String),
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// The upstream asked us to come back later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Errors that describe one bad page rather than a broken connection.
    pub fn is_page_local(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Computation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

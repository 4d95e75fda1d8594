use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // Ledger reads
    #[error("transient read failure: {0}")]
    TransientRead(String),
    #[error("read of {locator} exhausted after {attempts} attempts: {last_error}")]
    ReadExhausted { locator: String, attempts: u32, last_error: String },
    #[error("block {0} not found")]
    BlockNotFound(u64),
    #[error("malformed ledger response: {0}")]
    Malformed(String),

    // Durable state
    #[error("persistence failure on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Only transient failures are worth another attempt. Everything else is
    /// reported to the caller as is.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientRead(_))
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence { path: path.into(), source }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        Self::TransientRead(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! Error types for metergate-ledger

use thiserror::Error;

/// Ledger error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input (empty identifier, negative token count). Never reaches the store.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connectivity, timeout or storage failure during an append or query
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Empty result, only produced when the caller opted into the not-found policy
    #[error("not found: {0}")]
    NotFound(String),

    /// A token sum no longer fits in a 64-bit integer. Retrying cannot help.
    #[error("token total overflow: {0}")]
    Overflow(String),

    /// Missing or unusable store parameters at initialization
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether a caller may reasonably retry the failed operation
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// SQLSTATE for numeric_value_out_of_range
const PG_NUMERIC_OUT_OF_RANGE: &str = "22003";

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // SQLite reports SUM overflow as a generic error with this message.
            if db.code().as_deref() == Some(PG_NUMERIC_OUT_OF_RANGE)
                || db.message().contains("integer overflow")
            {
                return Self::Overflow(db.message().to_string());
            }
        }
        Self::StoreUnavailable(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

use crate::point::PointError;
use crate::query::ParseError;

/// Error type for client operations.
///
/// Every failure surfaces to the caller unchanged; the client never retries
/// on its own. [`Error::is_retryable`] classifies which failures a caller's
/// retry policy may reasonably resubmit.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Endpoint unreachable: {0}")]
    Connection(String),

    #[error("Credentials rejected: {0}")]
    Auth(String),

    #[error("Invalid point: {0}")]
    Validation(#[from] PointError),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Invalid query expression: {0}")]
    QuerySyntax(#[from] ParseError),

    #[error("Query failed: {0}")]
    Query(String),
}

impl Error {
    /// Transient transport/store failures are retryable; local validation
    /// and credential rejections are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Write(_) | Error::Query(_)
        )
    }
}

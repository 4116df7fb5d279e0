//! Error types for the orchestration client.

use std::time::Duration;

/// Errors surfaced by submission, cancellation, and status calls.
///
/// Transient polling failures never reach callers as values of this type;
/// the poller logs and skips them.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend answered with a non-success HTTP status.
    #[error("backend rejected the request with status {status}: {message}")]
    Backend { status: u16, message: String },

    /// The request never completed.
    #[error("request to the backend failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A bounded call exceeded its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The submission response carried no task id.
    #[error("backend accepted the command but returned no task id")]
    MissingTaskId,

    /// The submission payload was rejected before any network call.
    #[error("command must not be empty")]
    EmptyCommand,
}

pub type Result<T> = std::result::Result<T, Error>;

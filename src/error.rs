//! Error types for API transport and client-side operations.

use reqwest::StatusCode;
use thiserror::Error;

/// A failed call against the Farewatch API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    /// The response arrived but its body was not the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// Status code of the failure, when the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Transport(e) => e.status(),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Decode(_) => None,
        }
    }
}

/// A failed client operation, tagged with the action that was underway.
///
/// Every failure is recoverable: callers report it and leave the relevant
/// state unchanged. Nothing in this crate retries on its own.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("search failed: {0}")]
    Search(#[source] ApiError),

    #[error("loading more results failed: {0}")]
    Pagination(#[source] ApiError),

    #[error("creating price watch failed: {0}")]
    WatchCreate(#[source] ApiError),

    #[error("loading price watches failed: {0}")]
    WatchList(#[source] ApiError),

    #[error("deleting price watch failed: {0}")]
    WatchDelete(#[source] ApiError),

    #[error("invalid search filters: {0}")]
    InvalidFilters(String),
}

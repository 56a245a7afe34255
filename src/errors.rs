//! Error types for quakemap.
//!
//! Uses `thiserror` for library-style error definitions. Fetching is the only
//! fallible operation in the pipeline; everything downstream of a successful
//! fetch tolerates bad data by skipping it.

use thiserror::Error;

/// Errors raised while fetching an earthquake feed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The network call itself failed (DNS, connect, TLS, timeout, body read)
    #[error("failed to fetch data: {0}")]
    Transport(#[from] reqwest::Error),

    /// The feed answered with a non-success status
    #[error("failed to fetch data: HTTP {status}")]
    Status { status: u16 },
}

impl FetchError {
    /// HTTP status of the failed response, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

//! Error types for the fetcher.

use thiserror::Error;

/// Errors a single fetch attempt can end with, other than a proxy
/// authentication challenge.
///
/// A 407 is never represented here: it is reported as
/// [`FetchOutcome::ProxyAuthRequired`](crate::FetchOutcome::ProxyAuthRequired)
/// so that the caller can escalate credentials. Everything in this enum is
/// final for the attempt and is not retried by the credential state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The URI scheme is not fetched over HTTP.
    #[error("Unsupported scheme '{0}': only http and https are fetched")]
    UnsupportedScheme(String),

    /// The proxy URL could not be turned into a transport proxy.
    #[error("Invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        /// The proxy URL as configured.
        proxy: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded its timeout.
    #[error("Request to {url} timed out")]
    Timeout {
        /// The URI that was being fetched.
        url: String,
    },

    /// The server (or proxy) answered with a non-success status other than 407.
    #[error("HTTP status {status} fetching {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// The URI that was being fetched.
        url: String,
    },

    /// DNS, connection, TLS or body-read failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    /// Check if this is a timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The HTTP status, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

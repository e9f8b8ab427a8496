//! Error types for credential negotiation and resource resolution.

use thiserror::Error;

use proxyauth_client::FetchError;
use proxyauth_common::ProxyAuthState;

/// Errors raised by the authorization controller itself.
#[derive(Debug, Error)]
pub enum AuthError {
    /// `advance` was called from a state it cannot leave.
    ///
    /// This is a caller bug: a chain that reached `Abort` must stop.
    #[error("Invalid proxy auth transition from state '{0}'")]
    InvalidStateTransition(ProxyAuthState),
}

/// Errors from a credential store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    /// An entry exists but cannot be decoded.
    #[error("Corrupt credential entry for '{target}': {reason}")]
    Corrupt {
        /// The store key.
        target: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Errors from an interactive credential prompt.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Terminal or dialog I/O failed.
    #[error("Prompt I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No interactive surface is available.
    #[error("Prompt unavailable: {0}")]
    Unavailable(String),
}

/// Final failures of [`EntityResolver`](crate::EntityResolver) operations.
///
/// Only these reach the caller; 407 challenges, credential-store misses,
/// unusable prompt input and persist failures are handled while escalating.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The proxy kept demanding credentials and escalation ran out of options.
    #[error("Proxy authentication aborted for {uri}{}", proxy.as_ref().map(|p| format!(" via {p}")).unwrap_or_default())]
    Aborted {
        /// The URI that was being fetched.
        uri: String,
        /// The proxy that refused, if one was configured.
        proxy: Option<String>,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The fetch failed for a reason other than proxy authentication.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The controller was driven incorrectly.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The entity loader could not find the resource.
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// The entity loader cannot produce the requested kind of object.
    #[error("Unsupported entity type '{0}'")]
    UnsupportedEntityType(String),

    /// Reading a local resource failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Check if escalation ended in `Abort`.
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Check if the caller cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

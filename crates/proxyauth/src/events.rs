//! Event types for the resolver loop
//!
//! The resolver emits these while it drives a fetch chain so that a front-end
//! can show progress (which tier is being tried, when the user was asked).
//!
//! Events are **observability** only. The callback cannot influence the chain;
//! decisions are made by the controller and its prompt collaborator.

use proxyauth_common::ProxyAuthState;

/// Events emitted by [`EntityResolver`](crate::EntityResolver) during a fetch chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveEvent {
    /// A fetch attempt is about to start
    Attempt {
        /// URI being fetched
        uri: String,
        /// Tier the attempt runs with
        state: ProxyAuthState,
    },

    /// The proxy answered 407 and the controller escalated
    Escalated {
        /// Proxy host, if one is configured
        proxy: Option<String>,
        from: ProxyAuthState,
        to: ProxyAuthState,
        /// Whether the user was asked for credentials
        prompted: bool,
    },

    /// The chain ended with a body
    Resolved {
        uri: String,
        /// Tier that succeeded
        state: ProxyAuthState,
    },
}

/// Callback for receiving resolver events
pub type EventCallback = Box<dyn Fn(&ResolveEvent) + Send + Sync>;

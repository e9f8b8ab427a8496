//! # proxyauth-common
//!
//! Common types shared by the proxy-authentication fetcher and controller.
//!
//! This crate provides the vocabulary the rest of the workspace speaks:
//! - The escalation state of a fetch chain ([`ProxyAuthState`])
//! - Credentials and what gets attached to a proxy ([`NetworkCredential`], [`ProxyCredential`])
//! - The per-chain proxy target ([`ProxyTarget`])
//! - Serializable configuration for fetching and resolving
//!
//! ## Example
//!
//! ```
//! use proxyauth_common::{NetworkCredential, ProxyAuthState, ProxyCredential, ProxyTarget};
//! use url::Url;
//!
//! let uri = Url::parse("https://docs.example.com/a.xml").unwrap();
//! let proxy = Url::parse("http://proxy.example.com:8080").unwrap();
//! let mut target = ProxyTarget::new(uri, Some(proxy));
//!
//! assert_eq!(target.proxy_host(), Some("proxy.example.com"));
//! assert!(target.credential().is_none());
//!
//! let credential = NetworkCredential::new("alice", "s3cret").with_domain("corp");
//! target.attach(ProxyCredential::explicit(credential));
//!
//! assert!(ProxyAuthState::NoCredentials < ProxyAuthState::Abort);
//! ```

/// Credential types and username decomposition.
pub mod credential;
/// Configuration for the fetcher, the proxy and the resolver loop.
pub mod config;
/// The escalation state machine's states.
pub mod state;
/// The proxy target a fetch chain runs against.
pub mod target;

pub use config::{FetchConfig, ProxySettings, ResolverConfig};
pub use credential::{NetworkCredential, ProxyCredential, parse_username};
pub use state::ProxyAuthState;
pub use target::ProxyTarget;

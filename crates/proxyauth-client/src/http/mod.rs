//! reqwest-based fetcher.
//!
//! [`HttpFetcher`] performs one GET per call through the proxy named by the
//! [`ProxyTarget`](proxyauth_common::ProxyTarget), attaching whatever
//! credential the target carries as HTTP Basic `Proxy-Authorization`.
//!
//! # 407 detection
//!
//! A proxy can refuse in two ways:
//!
//! - For `http://` URIs the request is forwarded and the proxy answers with
//!   status 407 directly.
//! - For `https://` URIs the proxy refuses the `CONNECT` tunnel and the
//!   transport reports an error whose source chain names the 407.
//!
//! Both are classified as
//! [`FetchOutcome::ProxyAuthRequired`](crate::FetchOutcome::ProxyAuthRequired).
//! Every other status or transport error is a failure.
//!
//! # Ambient identity
//!
//! A target may carry [`ProxyCredential::DefaultIdentity`](proxyauth_common::ProxyCredential).
//! The fetcher resolves it to the identity configured with
//! [`HttpFetcher::with_default_identity`], or sends no credential when the
//! host environment supplied none.

mod client;

pub use client::{HttpFetcher, is_proxy_auth_required};

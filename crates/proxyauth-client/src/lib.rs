//! # proxyauth-client
//!
//! Fetches external resources over HTTP/HTTPS through a proxy and reports
//! whether the proxy demanded authentication.
//!
//! This crate provides a unified interface for fetching through the
//! [`ResourceFetcher`] trait. Every attempt ends in one of three
//! [`FetchOutcome`]s:
//! - `Success` with the body stream
//! - `ProxyAuthRequired` when the proxy answered 407
//! - `Failed` for everything else, which the caller must not retry
//!
//! ## Example
//!
//! ```no_run
//! use proxyauth_client::{FetchOutcome, HttpFetcher, ResourceFetcher};
//! use proxyauth_common::{FetchConfig, ProxyTarget};
//! use url::Url;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = HttpFetcher::new(FetchConfig::default())?;
//!
//! let uri = Url::parse("https://docs.example.com/schema.xsd")?;
//! let proxy = Url::parse("http://proxy.example.com:8080")?;
//! let target = ProxyTarget::new(uri, Some(proxy));
//!
//! match fetcher.fetch(&target).await {
//!     FetchOutcome::Success(stream) => println!("{} bytes", stream.bytes().await?.len()),
//!     FetchOutcome::ProxyAuthRequired => println!("proxy wants credentials"),
//!     FetchOutcome::Failed(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use url::Url;

use proxyauth_common::{ProxySettings, ProxyTarget};

pub mod error;
pub mod http;
pub mod stream;

pub use error::FetchError;
pub use http::HttpFetcher;
pub use stream::ResourceStream;

/// How a single fetch attempt ended.
#[derive(Debug)]
#[must_use]
pub enum FetchOutcome {
    /// 2xx response.
    Success(ResourceStream),
    /// The proxy answered 407 Proxy Authentication Required.
    ProxyAuthRequired,
    /// Any other failure. Final for this fetch.
    Failed(FetchError),
}

impl FetchOutcome {
    /// Check if the proxy demanded authentication.
    pub const fn is_proxy_auth_required(&self) -> bool {
        matches!(self, Self::ProxyAuthRequired)
    }
}

/// Trait for fetcher implementations.
///
/// One call performs exactly one GET of `target.uri()` through
/// `target.proxy()`, with `target.credential()` attached to the proxy. It
/// never retries and never changes shared state.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Perform one fetch attempt and classify the result.
    async fn fetch(&self, target: &ProxyTarget) -> FetchOutcome;

    /// Whether [`ProxyCredential::DefaultIdentity`](proxyauth_common::ProxyCredential)
    /// resolves to a credential. When it does not, an attempt carrying it is
    /// identical to one without credentials.
    fn has_default_identity(&self) -> bool {
        true
    }
}

/// Supplies the proxy for a URI.
///
/// Implemented by the host environment; the fetcher and controller never
/// discover proxies themselves.
pub trait ProxyResolver: Send + Sync {
    /// The proxy to route `uri` through, or `None` to go direct.
    fn proxy_for(&self, uri: &Url) -> Option<Url>;
}

impl ProxyResolver for ProxySettings {
    fn proxy_for(&self, uri: &Url) -> Option<Url> {
        Self::proxy_for(self, uri)
    }
}

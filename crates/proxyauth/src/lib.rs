//! # proxyauth
//!
//! Resolve external resources through an authenticating proxy.
//!
//! When a proxy answers `407 Proxy Authentication Required`, the
//! [`ProxyAuthorizationController`] escalates through credential tiers,
//! cheapest first: whatever is already attached, the ambient identity, a
//! session-cached or stored credential, and finally an interactive prompt. The
//! [`EntityResolver`] drives that loop around a [`ResourceFetcher`] and hands
//! back the body stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use proxyauth::{
//!     EntityResolver, HttpFetcher, MemoryCredentialStore, NoPrompt, ProxyAuthorizationController,
//! };
//! use proxyauth_common::{FetchConfig, ProxySettings};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let controller = Arc::new(ProxyAuthorizationController::new(
//!     Arc::new(MemoryCredentialStore::new()),
//!     Arc::new(NoPrompt),
//! ));
//! let resolver = EntityResolver::new(
//!     HttpFetcher::new(FetchConfig::default())?,
//!     controller,
//!     Arc::new(ProxySettings::from_env()),
//! );
//!
//! let uri = Url::parse("https://docs.example.com/schema.xsd")?;
//! let body = resolver.fetch(&uri, &CancellationToken::new()).await?.bytes().await?;
//! println!("{} bytes", body.len());
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod entity;
pub mod error;
pub mod events;
pub mod prompt;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod test_support;

pub use proxyauth_client::*;
pub use proxyauth_common::*;

pub use controller::{ProxyAuthorizationController, Transition};
pub use entity::{EntityKind, EntityLoader, FileEntityLoader, ResolvedEntity};
pub use error::{AuthError, PromptError, ResolveError, StoreError};
pub use events::{EventCallback, ResolveEvent};
pub use prompt::{CredentialPrompt, NoPrompt, PromptResponse};
pub use resolver::EntityResolver;
pub use store::{CredentialStore, MemoryCredentialStore, PersistScope, StoredCredential};
